pub mod client;
pub mod error;
pub mod frame;

pub use client::RpcClient;
pub use error::ProtoError;
pub use frame::{read_frame, write_frame, MAX_FRAME_LEN};
