//! Gym Core - configuration, error taxonomy and logging shared by every crate
//! in the workspace.

pub mod async_utils;
pub mod config;
pub mod error;
pub mod logging;

pub use async_utils::*;
pub use config::*;
pub use error::*;
pub use logging::*;

// Re-export commonly used external types
pub use tokio;
pub use tracing;
