pub mod handler;
pub mod lifecycle;
pub mod store;

pub use handler::TaskHandler;
pub use lifecycle::Lifecycle;
pub use store::JobStore;
