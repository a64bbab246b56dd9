//! Domain-specific error types for estimator-core
//!
//! # Error Categories
//!
//! - **AssignmentError**: registry operations (validation, preconditions,
//!   wrapped backend failures)
//! - **BackendError**: HTTP status, transport and response decoding failures
//!
//! # Examples
//!
//! ```rust
//! use estimator::errors::{AssignmentError, AssignmentResult};
//!
//! fn require_city(city: Option<i64>) -> AssignmentResult<i64> {
//!     city.ok_or(AssignmentError::MissingField("city"))
//! }
//!
//! assert!(require_city(None).unwrap_err().is_validation());
//! ```

pub mod assignment;
pub mod backend;

pub use assignment::AssignmentError;
pub use backend::{BackendError, GENERIC_FAILURE_MESSAGE};

/// Result type alias for registry operations
pub type AssignmentResult<T> = Result<T, AssignmentError>;

/// Result type alias for backend calls
pub type BackendResult<T> = Result<T, BackendError>;
