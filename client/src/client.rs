//! Trainer socket client implementation

use std::path::Path;

use sqltrainer_protocol::{
    read_message, write_message, CheckAnswer, ExerciseRequest, ExerciseState, FavouriteRequest,
    QueryRequest, Request, Response, ResultTable, TopicRequest, VerifyOutcome,
};
use tokio::io::BufReader;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

use crate::error::{ClientError, ClientResult};

/// Connection to the trainer server. Requests are answered in order.
pub struct TrainerClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TrainerClient {
    /// Connect to the server socket at `socket_path`
    pub async fn connect(socket_path: impl AsRef<Path>) -> ClientResult<Self> {
        let stream = UnixStream::connect(socket_path.as_ref()).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    /// Send one request and wait for its response. `error` responses are
    /// returned as they are.
    pub async fn request(&mut self, request: &Request) -> ClientResult<Response> {
        tracing::debug!(op = request.op(), "Sending request");
        write_message(&mut self.writer, request).await?;
        read_message(&mut self.reader)
            .await?
            .ok_or(ClientError::Disconnected)
    }

    /// Like [`Self::request`], but turns `error` responses into
    /// [`ClientError::Server`].
    async fn call(&mut self, request: &Request) -> ClientResult<Response> {
        match self.request(request).await? {
            Response::Error { code, message } => Err(ClientError::Server { code, message }),
            response => Ok(response),
        }
    }

    pub async fn ping(&mut self) -> ClientResult<()> {
        match self.call(&Request::Ping).await? {
            Response::Pong => Ok(()),
            _ => Err(ClientError::UnexpectedResponse("ping")),
        }
    }

    /// Run a query without grading it
    pub async fn execute_query(
        &mut self,
        student: &str,
        topic_short: &str,
        enumber: u32,
        query: &str,
    ) -> ClientResult<ResultTable> {
        let request = Request::ExecuteQuery(query_request(student, topic_short, enumber, query));
        match self.call(&request).await? {
            Response::Query { result } => Ok(result),
            _ => Err(ClientError::UnexpectedResponse("execute_query")),
        }
    }

    /// Grade a query against the exercise's reference solution
    pub async fn check_answer(
        &mut self,
        student: &str,
        topic_short: &str,
        enumber: u32,
        query: &str,
    ) -> ClientResult<CheckAnswer> {
        let request = Request::CheckAnswer(query_request(student, topic_short, enumber, query));
        match self.call(&request).await? {
            Response::CheckAnswer(outcome) => Ok(outcome),
            _ => Err(ClientError::UnexpectedResponse("check_answer")),
        }
    }

    pub async fn solution_result(
        &mut self,
        student: &str,
        topic_short: &str,
        enumber: u32,
    ) -> ClientResult<ResultTable> {
        let request = Request::SolutionResult(exercise_request(student, topic_short, enumber));
        match self.call(&request).await? {
            Response::Query { result } => Ok(result),
            _ => Err(ClientError::UnexpectedResponse("solution_result")),
        }
    }

    /// Install the topic schema if needed; returns the status message
    pub async fn check_or_install_db(
        &mut self,
        student: &str,
        topic_short: &str,
    ) -> ClientResult<String> {
        let request = Request::CheckOrInstallDb(topic_request(student, topic_short));
        self.message(&request, "check_or_install_db").await
    }

    pub async fn reset_db(
        &mut self,
        student: &str,
        topic_short: &str,
        enumber: u32,
    ) -> ClientResult<String> {
        let request = Request::ResetDb(exercise_request(student, topic_short, enumber));
        self.message(&request, "reset_db").await
    }

    pub async fn load_exercise_state(
        &mut self,
        student: &str,
        topic_short: &str,
        enumber: u32,
    ) -> ClientResult<ExerciseState> {
        let request = Request::LoadExerciseState(exercise_request(student, topic_short, enumber));
        self.state(&request, "load_exercise_state").await
    }

    pub async fn set_favourite(
        &mut self,
        student: &str,
        topic_short: &str,
        enumber: u32,
        favourite: bool,
    ) -> ClientResult<ExerciseState> {
        let request = Request::SetFavourite(FavouriteRequest {
            student: student.to_string(),
            topic_short: topic_short.to_string(),
            enumber,
            favourite,
        });
        self.state(&request, "set_favourite").await
    }

    /// Grade every exercise of a topic with its own reference solution
    pub async fn verify_topic(
        &mut self,
        student: &str,
        topic_short: &str,
    ) -> ClientResult<Vec<VerifyOutcome>> {
        let request = Request::VerifyTopic(topic_request(student, topic_short));
        match self.call(&request).await? {
            Response::Verify { outcomes, .. } => Ok(outcomes),
            _ => Err(ClientError::UnexpectedResponse("verify_topic")),
        }
    }

    async fn message(&mut self, request: &Request, op: &'static str) -> ClientResult<String> {
        match self.call(request).await? {
            Response::Message { message } => Ok(message),
            _ => Err(ClientError::UnexpectedResponse(op)),
        }
    }

    async fn state(&mut self, request: &Request, op: &'static str) -> ClientResult<ExerciseState> {
        match self.call(request).await? {
            Response::ExerciseState(state) => Ok(state),
            _ => Err(ClientError::UnexpectedResponse(op)),
        }
    }
}

fn query_request(student: &str, topic_short: &str, enumber: u32, query: &str) -> QueryRequest {
    QueryRequest {
        student: student.to_string(),
        topic_short: topic_short.to_string(),
        enumber,
        query: query.to_string(),
    }
}

fn exercise_request(student: &str, topic_short: &str, enumber: u32) -> ExerciseRequest {
    ExerciseRequest {
        student: student.to_string(),
        topic_short: topic_short.to_string(),
        enumber,
    }
}

fn topic_request(student: &str, topic_short: &str) -> TopicRequest {
    TopicRequest {
        student: student.to_string(),
        topic_short: topic_short.to_string(),
    }
}
