pub mod error;
pub mod handler;
pub mod node;
pub mod service;

pub use error::WorkerError;
pub use handler::{EchoHandler, HandlerRegistry};
pub use node::{WorkerConfig, WorkerNode};
pub use service::ServiceTable;
