//! Cultural Sound Lab AI service environment validation
//!
//! Loads the service configuration from the environment, enforces the schema
//! and production requirements, and probes the queue, database, object
//! storage and accelerator before the media pipelines start.

pub mod config;
pub mod error;
pub mod services;

// Re-export commonly used types for convenience
pub use config::{AiServiceSettings, EnvSource};
pub use error::{AppError, AppResult};
pub use services::{StartupReport, run_startup_validation};
