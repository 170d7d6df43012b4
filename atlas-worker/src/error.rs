use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("registration rejected by scheduler: {0}")]
    RegistrationRejected(String),

    #[error("protocol error: {0}")]
    Proto(#[from] atlas_proto::ProtoError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
