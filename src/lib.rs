pub mod api;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod server;
pub mod shutdown;
pub mod store;
pub mod worker;

pub use error::{RestJobError, Result};
