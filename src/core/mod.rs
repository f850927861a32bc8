//! Core functionality shared by the pipeline and the services:
//! - Configuration management
//! - Error handling
//! - Logging setup

pub mod config;
pub mod error;
pub mod error_types;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, LoggingConfig, StreamConfig, UpstreamConfig};
pub use error::{AppError, Result, StreamError};
pub use error_types::ErrorCategoryCode;
pub use logging::{generate_request_id, init_logging};
