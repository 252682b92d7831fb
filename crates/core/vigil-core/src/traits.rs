//! Core traits shared across Vigil crates.

use crate::VigilResult;

/// Trait for values that can check their own invariants
pub trait Validatable {
    /// Validate this value
    fn validate(&self) -> VigilResult<()>;

    /// Check if this value is valid
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
