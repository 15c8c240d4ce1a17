//! Request dispatch.
//!
//! Every [`Request`] is answered with exactly one [`Response`]; grader errors
//! become `error` responses carrying a stable [`ErrorCode`].

mod converters;

use grader::{Catalog, Evaluator, GraderError, GraderResult, UserStateStore, RESET_MESSAGE};
use sqltrainer_protocol::{
    ExerciseRequest, FavouriteRequest, QueryRequest, Request, Response, TopicRequest,
};

use crate::persistence::ExerciseStateRepository;

pub use converters::{
    convert_check_outcome_to_wire, convert_error_code, convert_exercise_outcome_to_wire,
    convert_state_to_wire, convert_tabular_to_wire, unavailable_message,
};

/// Answers requests on behalf of the connection tasks.
pub struct TrainerService<C, S> {
    evaluator: Evaluator<C, S>,
}

impl<C, S> TrainerService<C, S>
where
    C: Catalog,
    S: UserStateStore + ExerciseStateRepository,
{
    pub fn new(evaluator: Evaluator<C, S>) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &Evaluator<C, S> {
        &self.evaluator
    }

    pub async fn handle(&self, request: Request) -> Response {
        let op = request.op();
        tracing::debug!(op, student = ?request.student(), "Request");

        let result = match request {
            // =================================================================
            // Query endpoints
            // =================================================================
            Request::ExecuteQuery(req) => self.execute_query(req).await,
            Request::CheckAnswer(req) => self.check_answer(req).await,
            Request::SolutionResult(req) => self.solution_result(req).await,

            // =================================================================
            // Schema endpoints
            // =================================================================
            Request::CheckOrInstallDb(req) => self.check_or_install_db(req).await,
            Request::ResetDb(req) => self.reset_db(req).await,

            // =================================================================
            // Progress endpoints
            // =================================================================
            Request::LoadExerciseState(req) => self.load_exercise_state(req).await,
            Request::SetFavourite(req) => self.set_favourite(req).await,
            Request::VerifyTopic(req) => self.verify_topic(req).await,

            Request::Ping => Ok(Response::Pong),
        };

        result.unwrap_or_else(|err| self.error_response(op, err))
    }

    async fn execute_query(&self, req: QueryRequest) -> GraderResult<Response> {
        let result = self
            .evaluator
            .execute_query(&req.student, &req.topic_short, req.enumber, &req.query)
            .await?;
        Ok(Response::Query {
            result: convert_tabular_to_wire(result),
        })
    }

    async fn check_answer(&self, req: QueryRequest) -> GraderResult<Response> {
        let outcome = self
            .evaluator
            .check_answer(&req.student, &req.topic_short, req.enumber, &req.query)
            .await?;
        Ok(Response::CheckAnswer(convert_check_outcome_to_wire(outcome)))
    }

    async fn solution_result(&self, req: ExerciseRequest) -> GraderResult<Response> {
        let result = self
            .evaluator
            .solution_result(&req.student, &req.topic_short, req.enumber)
            .await?;
        Ok(Response::Query {
            result: convert_tabular_to_wire(result),
        })
    }

    async fn check_or_install_db(&self, req: TopicRequest) -> GraderResult<Response> {
        let status = self
            .evaluator
            .check_or_install_db(&req.student, &req.topic_short)
            .await?;
        Ok(Response::Message {
            message: status.message().to_string(),
        })
    }

    async fn reset_db(&self, req: ExerciseRequest) -> GraderResult<Response> {
        self.evaluator
            .reset_db(&req.student, &req.topic_short, req.enumber)
            .await?;
        Ok(Response::Message {
            message: RESET_MESSAGE.to_string(),
        })
    }

    async fn load_exercise_state(&self, req: ExerciseRequest) -> GraderResult<Response> {
        self.evaluator
            .catalog()
            .exercise(&req.topic_short, req.enumber)
            .await?;
        let state = self
            .evaluator
            .store()
            .load_state(&req.student, &req.topic_short, req.enumber)
            .await?;
        Ok(Response::ExerciseState(convert_state_to_wire(
            &req.topic_short,
            req.enumber,
            state,
        )))
    }

    async fn set_favourite(&self, req: FavouriteRequest) -> GraderResult<Response> {
        self.evaluator
            .catalog()
            .exercise(&req.topic_short, req.enumber)
            .await?;
        let store = self.evaluator.store();
        store
            .set_favourite(&req.student, &req.topic_short, req.enumber, req.favourite)
            .await?;
        let state = store
            .load_state(&req.student, &req.topic_short, req.enumber)
            .await?;
        Ok(Response::ExerciseState(convert_state_to_wire(
            &req.topic_short,
            req.enumber,
            state,
        )))
    }

    async fn verify_topic(&self, req: TopicRequest) -> GraderResult<Response> {
        let outcomes = self
            .evaluator
            .verify_topic(&req.student, &req.topic_short)
            .await?;
        Ok(Response::Verify {
            topic: req.topic_short,
            outcomes: outcomes
                .into_iter()
                .map(convert_exercise_outcome_to_wire)
                .collect(),
        })
    }

    fn error_response(&self, op: &str, err: GraderError) -> Response {
        let code = convert_error_code(&err);
        let message = match &err {
            err if err.is_transient() => {
                let host = self.evaluator.registry().connector().policy().host_label();
                tracing::warn!(op, "Student database unavailable: {err}");
                unavailable_message(&host)
            }
            GraderError::NotFound(_) | GraderError::MissingEvalStatement(_) => {
                tracing::debug!(op, "Request rejected: {err}");
                err.to_string()
            }
            _ => {
                tracing::error!(op, "Request failed: {err}");
                err.to_string()
            }
        };
        Response::error(code, message)
    }
}
