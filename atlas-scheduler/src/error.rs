use atlas_types::dag::ParseError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchedulerError>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("DAG parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("cyclic dependency detected, batch rejected")]
    CyclicDependency,

    #[error("duplicate job id {0:?} in DAG batch")]
    DuplicateJobId(String),

    #[error("unknown service id: {0}")]
    UnknownService(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("protocol error: {0}")]
    Proto(#[from] atlas_proto::ProtoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchedulerError {
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }
}
