pub mod command;
pub mod engine;
pub mod error;
pub mod inputs;
pub mod runner;
pub mod schema;
pub mod session;
pub mod storage;
pub mod validator;

// Re-export commonly used types
pub use command::Command;
pub use engine::{DialogEngine, TurnResult};
pub use error::{FlowError, Result, ValidationError};
pub use inputs::{FieldValue, Inputs};
pub use runner::{
    ExecutionOutput, JobConfig, JobExecutor, JobOutcome, JobRequest, JobRunner, ProcessExecutor,
    scan_reports,
};
pub use schema::{DialogSchema, FieldSpec, FieldType, field_keys};
pub use session::{DialogState, Session, SessionHandle};
pub use storage::{InMemorySessionStore, SessionStore};
pub use validator::validate;
