//! # Vigil Core
//!
//! Shared foundation for the Vigil diagnostics pipeline.
//!
//! ## Features
//!
//! - **Error Handling**: Standardized error type and result alias
//! - **Configuration**: Layered file and environment configuration sources
//! - **Logging**: `tracing-subscriber` initialisation
//! - **Utilities**: Time helpers and a sliding-window rate limiter
//!
//! ## Quick Start
//!
//! ```rust
//! use vigil_core::{VigilError, VigilResult};
//!
//! fn example_function() -> VigilResult<String> {
//!     Ok("Hello Vigil!".to_string())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod utils;

// Re-export commonly used items
pub use error::{VigilError, VigilResult};
pub use traits::Validatable;

/// Version information for the Vigil Core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of the Vigil Core library
pub const NAME: &str = env!("CARGO_PKG_NAME");
