pub mod attendance;
pub mod child;
pub mod parent;

use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// Gender as collected on the form. Values outside this set are coerced to
/// `Male` by the normalizer (with a warning) rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Gender {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err(anyhow::anyhow!("Unknown gender: {s}")),
        }
    }
}

/// The fixed set of Sunday services. Stored as TEXT; matched exactly
/// (case-sensitive) against the form's "Which Service" column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Service {
    First,
    Second,
    Third,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::First => "First Service",
            Service::Second => "Second Service",
            Service::Third => "Third Service",
        }
    }

    /// Exact-match parse; anything else is a per-row validation error.
    pub fn parse(s: &str) -> Result<Self, IngestError> {
        match s {
            "First Service" => Ok(Service::First),
            "Second Service" => Ok(Service::Second),
            "Third Service" => Ok(Service::Third),
            other => Err(IngestError::Validation {
                field: "service_name".into(),
                reason: format!("unrecognized service '{other}'"),
            }),
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
