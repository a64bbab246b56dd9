//! Strongly typed identifiers used across the registry and the backend boundary.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const PROJECT_ID_PATTERN: &str = r"^[A-Za-z0-9_-]+$";

/// Client-side identifier of an assignment row. Never sent to the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalRowId(Uuid);

impl LocalRowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LocalRowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalRowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Staffing profile from the profile catalog.
    ProfileId
);
numeric_id!(
    /// City from the per-country city catalog.
    CityId
);
numeric_id!(
    /// Persisted backend step.
    StepId
);
numeric_id!(
    /// Backend Time & Material work package owning one or more steps.
    WorkPackageId
);

/// Country code from the country catalog (e.g. `"ES"`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryId(pub String);

impl CountryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CountryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CountryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for CountryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Project identifier as used in backend paths.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A project id is well-formed when it can be placed in a URL path as-is.
    pub fn is_well_formed(&self) -> bool {
        Regex::new(PROJECT_ID_PATTERN)
            .map(|re| re.is_match(&self.0))
            .unwrap_or(false)
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
