use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Gender;

/// Classroom bracket derived from a child's age. Boundaries are inclusive on
/// both ends of each range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeBracket {
    Nursery,
    Kindergarten,
    Primary,
    Juniors,
    Teens,
    Unknown,
}

impl AgeBracket {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeBracket::Nursery => "Nursery (0-2 years)",
            AgeBracket::Kindergarten => "Kindergarten (3-5 years)",
            AgeBracket::Primary => "Primary (6-9 years)",
            AgeBracket::Juniors => "Juniors (10-12 years)",
            AgeBracket::Teens => "Teens (13+ years)",
            AgeBracket::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for AgeBracket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// DB row struct — gender and age_bracket are stored as TEXT.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Child {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    /// Always populated: explicit from the form, or derived from birth_date
    /// at write time. Part of the (parent, name, age) natural key.
    pub age: i32,
    pub age_bracket: String,
    pub gender: String,
    pub special_needs: Option<String>,
    pub allergies: Option<String>,
    pub relationship_to_parent: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated child block from one submission row.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildCandidate {
    pub full_name: String,
    pub gender: Gender,
    /// None when the age cell was empty or non-numeric; the resolver then
    /// derives it from birth_date (the normalizer guarantees one of the two).
    pub age: Option<i32>,
    pub birth_date: Option<NaiveDate>,
    pub special_needs: Option<String>,
    pub allergies: Option<String>,
    /// Explicit relationship from the form, if any ("Ward" etc.); when empty
    /// the deriver fills in Son/Daughter from gender.
    pub relationship_to_parent: Option<String>,
}

/// Fully derived child record ready for insertion.
#[derive(Debug, Clone)]
pub struct NewChild {
    pub parent_id: Uuid,
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    pub age: i32,
    pub age_bracket: AgeBracket,
    pub gender: Gender,
    pub special_needs: Option<String>,
    pub allergies: Option<String>,
    pub relationship_to_parent: String,
}
