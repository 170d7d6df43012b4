pub mod dag;
pub mod job;
pub mod worker;

pub use dag::{DagJobSpec, ParseError, DAG_ID_PREFIX};
pub use job::{Job, JobId, JobStatus, PRIORITY_HIGH, PRIORITY_LOW, PRIORITY_NORMAL};
pub use worker::WorkerAddr;
