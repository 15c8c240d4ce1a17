use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A student query against one exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub student: String,
    pub topic_short: String,
    pub enumber: u32,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseRequest {
    pub student: String,
    pub topic_short: String,
    pub enumber: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRequest {
    pub student: String,
    pub topic_short: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavouriteRequest {
    pub student: String,
    pub topic_short: String,
    pub enumber: u32,
    pub favourite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Run a query without grading it.
    ExecuteQuery(QueryRequest),
    /// Reset the schema, run the query and grade it.
    CheckAnswer(QueryRequest),
    /// Reset the schema and return the reference output.
    SolutionResult(ExerciseRequest),
    CheckOrInstallDb(TopicRequest),
    ResetDb(ExerciseRequest),
    LoadExerciseState(ExerciseRequest),
    SetFavourite(FavouriteRequest),
    /// Grade every exercise of a topic with its own reference solution.
    VerifyTopic(TopicRequest),
    Ping,
}

impl Request {
    /// Operation name as it appears in the `op` tag.
    pub fn op(&self) -> &'static str {
        match self {
            Request::ExecuteQuery(_) => "execute_query",
            Request::CheckAnswer(_) => "check_answer",
            Request::SolutionResult(_) => "solution_result",
            Request::CheckOrInstallDb(_) => "check_or_install_db",
            Request::ResetDb(_) => "reset_db",
            Request::LoadExerciseState(_) => "load_exercise_state",
            Request::SetFavourite(_) => "set_favourite",
            Request::VerifyTopic(_) => "verify_topic",
            Request::Ping => "ping",
        }
    }

    pub fn student(&self) -> Option<&str> {
        match self {
            Request::ExecuteQuery(req) | Request::CheckAnswer(req) => Some(&req.student),
            Request::SolutionResult(req)
            | Request::ResetDb(req)
            | Request::LoadExerciseState(req) => Some(&req.student),
            Request::CheckOrInstallDb(req) | Request::VerifyTopic(req) => Some(&req.student),
            Request::SetFavourite(req) => Some(&req.student),
            Request::Ping => None,
        }
    }
}

/// Rows plus comparison diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    pub result: Vec<Map<String, Value>>,
    #[serde(default)]
    pub miss_cols: Vec<String>,
    #[serde(default)]
    pub miss_rows: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckAnswer {
    pub correct: bool,
    /// Keyword policy violations, empty if none.
    pub message: String,
    pub user_result: ResultTable,
    pub solu_result: ResultTable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseState {
    pub topic_short: String,
    pub enumber: u32,
    pub buffer_save: String,
    pub is_correct: Option<bool>,
    pub favourite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOutcome {
    pub enumber: u32,
    pub correct: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The student's database cannot be reached right now; retry later.
    Unavailable,
    NotFound,
    FailedPrecondition,
    InvalidArgument,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Query { result: ResultTable },
    CheckAnswer(CheckAnswer),
    Message { message: String },
    ExerciseState(ExerciseState),
    Verify { topic: String, outcomes: Vec<VerifyOutcome> },
    Pong,
    Error { code: ErrorCode, message: String },
}

impl Response {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Response::Error {
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_is_tagged_by_op() {
        let request: Request = serde_json::from_value(json!({
            "op": "check_answer",
            "student": "mitro",
            "topic_short": "pc",
            "enumber": 3,
            "query": "SELECT 1"
        }))
        .unwrap();
        assert_eq!(request.op(), "check_answer");
        assert_eq!(request.student(), Some("mitro"));
        assert!(matches!(request, Request::CheckAnswer(ref q) if q.enumber == 3));
    }

    #[test]
    fn install_accepts_ignored_enumber() {
        let request: Request = serde_json::from_value(json!({
            "op": "check_or_install_db",
            "student": "mitro",
            "topic_short": "pc",
            "enumber": 1
        }))
        .unwrap();
        assert_eq!(
            request,
            Request::CheckOrInstallDb(TopicRequest {
                student: "mitro".into(),
                topic_short: "pc".into(),
            })
        );
    }

    #[test]
    fn ping_has_no_fields() {
        assert_eq!(serde_json::to_value(Request::Ping).unwrap(), json!({"op": "ping"}));
        assert_eq!(Request::Ping.student(), None);
    }

    #[test]
    fn error_response_shape() {
        let response = Response::error(ErrorCode::Unavailable, "database host db1 unavailable");
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"type": "error", "code": "unavailable", "message": "database host db1 unavailable"})
        );
        assert!(response.is_error());
    }

    #[test]
    fn query_response_shape() {
        let mut row = Map::new();
        row.insert("photo".into(), json!("nb02"));
        let response = Response::Query {
            result: ResultTable {
                result: vec![row],
                ..Default::default()
            },
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "type": "query",
                "result": {"result": [{"photo": "nb02"}], "miss_cols": [], "miss_rows": []}
            })
        );
    }

    #[test]
    fn unknown_op_is_rejected() {
        let parsed = serde_json::from_value::<Request>(json!({"op": "drop_everything"}));
        assert!(parsed.is_err());
    }
}
