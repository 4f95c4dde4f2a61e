//! Domain model (records, messages, ids, states, errors).

pub mod errors;
pub mod ids;
pub mod message;
pub mod record;
pub mod state;

pub use self::errors::{ErrorKind, PipelineError, ValidationError};
pub use self::ids::{IdParseError, MessageId, RunId, TransactionId};
pub use self::message::{Message, Response};
pub use self::record::{FaultMarker, Record};
pub use self::state::{ExitCode, NodeState};
