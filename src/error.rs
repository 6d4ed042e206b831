use thiserror::Error;
use uuid::Uuid;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the simulation core and the job subsystem.
///
/// Validation and lookup errors go back to the caller; simulation errors
/// are captured on the owning job and reported through its status.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("job not found: {0}")]
    JobNotFound(Uuid),

    #[error("result not ready: job {id} is {status}")]
    ResultNotReady { id: Uuid, status: String },

    #[error("job {id} is already terminal ({status})")]
    AlreadyTerminal { id: Uuid, status: String },

    #[error("simulation failed: {0}")]
    Simulation(String),

    #[error("IO operation failed")]
    Io(#[from] std::io::Error),

    #[error("serialization failed")]
    Json(#[from] serde_json::Error),

    #[error("CSV write failed")]
    Csv(#[from] csv::Error),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn simulation(msg: impl Into<String>) -> Self {
        EngineError::Simulation(msg.into())
    }
}
