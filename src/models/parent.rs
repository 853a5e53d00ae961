use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Gender;

/// DB row struct — gender is fetched as TEXT and parsed at the edges.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Parent {
    pub id: Uuid,
    pub full_name: String,
    pub gender: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub secondary_phone_number: Option<String>,
    pub role_in_church: Option<String>,
    pub department_in_church: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A validated parent extracted from one submission row, not yet resolved
/// against the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentCandidate {
    pub full_name: String,
    pub gender: Gender,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub secondary_phone_number: Option<String>,
    pub role_in_church: Option<String>,
    pub department_in_church: Option<String>,
    pub address: Option<String>,
}

impl ParentCandidate {
    /// At least one of email / phone / secondary phone must be present for
    /// the row to be matchable across weeks.
    pub fn has_contact_method(&self) -> bool {
        self.phone_number.is_some()
            || self.email.is_some()
            || self.secondary_phone_number.is_some()
    }
}
