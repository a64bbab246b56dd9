//! Assignment registry error types
//!
//! Errors fall into three categories, each with a stable code:
//!
//! - validation (`VALIDATION_FAILED`): user input that cannot be accepted,
//!   detected locally before any request is made
//! - precondition (`PRECONDITION_FAILED`): identifiers needed to address a
//!   backend entity are missing or ill-formed, also detected locally
//! - backend (`BACKEND_ERROR`): the request was sent and failed
//!
//! # Examples
//!
//! ```rust
//! use estimator::errors::AssignmentError;
//! use estimator::ids::{CityId, ProfileId};
//!
//! let err = AssignmentError::DuplicateAssignment {
//!     profile: ProfileId(1),
//!     city: CityId(10),
//! };
//! assert!(err.is_validation());
//! assert_eq!(err.error_code(), "VALIDATION_FAILED");
//! ```

use thiserror::Error;

use super::backend::BackendError;
use crate::ids::{CityId, CountryId, LocalRowId, ProfileId};

/// Errors raised by registry operations
#[derive(Error, Debug)]
pub enum AssignmentError {
    /// Row not present in the registry
    #[error("Row {0} not found")]
    RowNotFound(LocalRowId),

    /// Required field not set before save
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Process time must be strictly positive to save
    #[error("Process time must be greater than zero")]
    NonPositiveProcessTime,

    /// Another row already uses this profile and city
    #[error("Profile {profile} is already assigned to city {city}")]
    DuplicateAssignment {
        /// Profile of the conflicting pair
        profile: ProfileId,
        /// City of the conflicting pair
        city: CityId,
    },

    /// City is not part of the selected country's catalog
    #[error("City {city} does not belong to country {country}")]
    CityNotInCountry {
        /// Offending city
        city: CityId,
        /// Country selected on the row
        country: CountryId,
    },

    /// Year index outside the project's year span
    #[error("Year index {index} is outside the project span of {len} years")]
    YearOutOfRange {
        /// Requested index
        index: usize,
        /// Number of years in the span
        len: usize,
    },

    /// Numeric value rejected
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Field being edited
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// Every profile has exhausted its city combinations, or there are none
    #[error("No profiles available to assign")]
    NoProfilesAvailable,

    /// Identifiers needed to address a backend entity are missing
    #[error("Cannot address backend entity: {0}")]
    Precondition(String),

    /// Backend or transport failure
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Registry actor stopped
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}

impl AssignmentError {
    /// Create a precondition error
    pub fn precondition(message: impl Into<String>) -> Self {
        AssignmentError::Precondition(message.into())
    }

    /// Create an invalid value error
    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        AssignmentError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }

    /// Check if this error comes from local input validation
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AssignmentError::RowNotFound(_)
                | AssignmentError::MissingField(_)
                | AssignmentError::NonPositiveProcessTime
                | AssignmentError::DuplicateAssignment { .. }
                | AssignmentError::CityNotInCountry { .. }
                | AssignmentError::YearOutOfRange { .. }
                | AssignmentError::InvalidValue { .. }
                | AssignmentError::NoProfilesAvailable
        )
    }

    /// Check if this is an internal consistency problem with identifiers
    pub fn is_precondition(&self) -> bool {
        matches!(self, AssignmentError::Precondition(_))
    }

    /// Check if a backend request was made and failed
    pub fn is_backend(&self) -> bool {
        matches!(self, AssignmentError::Backend(_))
    }

    /// Get error code for CLI/API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AssignmentError::Precondition(_) => "PRECONDITION_FAILED",
            AssignmentError::Backend(_) => "BACKEND_ERROR",
            AssignmentError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            _ => "VALIDATION_FAILED",
        }
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            AssignmentError::Backend(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}
