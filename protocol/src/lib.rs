//! Wire protocol between the sqltrainer server and its clients.
//!
//! Every message is one JSON object on its own line. Requests are tagged by
//! `op`, responses by `type`:
//!
//! ```text
//! -> {"op":"execute_query","student":"mitro","topic_short":"pc","enumber":1,"query":"SELECT 1"}
//! <- {"type":"query","result":{"result":[{"?column?":"1"}],"miss_cols":[],"miss_rows":[]}}
//! ```
//!
//! A connection carries any number of requests; responses come back in
//! request order.

mod framing;
mod messages;

pub use framing::{decode, encode, read_message, write_message, FrameError};
pub use messages::{
    CheckAnswer, ErrorCode, ExerciseRequest, ExerciseState, FavouriteRequest, QueryRequest,
    Request, Response, ResultTable, TopicRequest, VerifyOutcome,
};
