pub mod types;
pub mod error;
pub mod config;
pub mod clients;
pub mod sync;

pub use types::*;
pub use error::{Result, SyncError};
