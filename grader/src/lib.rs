//! Per-student PostgreSQL sandboxes and answer evaluation.
//!
//! Each student gets a small connection pool (see [`registry`]) against their
//! own database. Every topic lives in a schema of the same name inside that
//! database; [`schema`] installs and drops it, [`reset`] rebuilds the state a
//! student should see right before a given exercise.
//!
//! Student SQL runs through [`executor`], which never fails for ordinary SQL
//! errors: faults, empty results and statements without output all come back
//! as a [`TabularResult`]. [`compare`] and [`policy`] decide whether an answer
//! is correct, and [`Evaluator`] wires all of it into the externally visible
//! operations.
//!
//! Topic/exercise metadata and per-student progress are owned by the embedding
//! application and reached through the [`Catalog`] and [`UserStateStore`]
//! traits.

pub mod catalog;
pub mod compare;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod policy;
pub mod pool;
pub mod postgres;
pub mod registry;
pub mod reset;
pub mod schema;
pub mod tabular;

pub use catalog::{Catalog, Evaluation, Exercise, Solution, Topic, UserStateStore};
pub use compare::{check_results, MAX_ROW_COUNT_DIFFERENCE};
pub use error::{EvalFault, GraderError, GraderResult};
pub use evaluator::{CheckOutcome, Evaluator, ExerciseOutcome, InstallStatus, RESET_MESSAGE};
pub use executor::{execute, execute_check, ERROR_IN_QUERY, NO_OUTPUT};
pub use policy::{check_mand_deny_list, KeywordViolations};
pub use pool::{AcquireError, AsyncPool, Pooled};
pub use postgres::{ConnectionPolicy, PgConnector, PgPoolConfig, StudentConn};
pub use registry::{Connector, PoolRegistry, ReaperHandle, RegistryConfig, StudentPool};
pub use tabular::{Row, TabularResult};
