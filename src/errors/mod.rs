//! Centralized error handling for guide providers
//!
//! # Error Categories
//!
//! - **Configuration Errors**: a backend rejected missing or invalid settings
//! - **Source Errors**: fetching or parsing guide data failed
//! - **Refresh Errors**: a backend could not update its cache and is degraded
//!
//! # Usage
//!
//! ```rust
//! use guide_providers::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Err(AppError::configuration("XMLTVURL is required"))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Source Results
pub type SourceResult<T> = Result<T, SourceError>;
