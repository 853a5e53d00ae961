//! Find-or-create resolution against the store.
//!
//! Both resolvers follow the same shape: look up by natural key, reuse the
//! match, otherwise attempt a conflict-aware insert. Losing an insert race
//! is expected under concurrent runs; the loser re-queries and uses the
//! winning row, so two workers never produce two records for one key.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::derive::{age_bracket, age_from_birthdate, relationship_or_default};
use crate::error::IngestError;
use crate::models::{
    attendance::NewAttendance,
    child::{ChildCandidate, NewChild},
    parent::ParentCandidate,
};
use crate::store::{InsertOutcome, RecordedAttendance, Store};

/// How an entity was resolved: freshly created, or matched to an existing
/// row (including the re-query after a lost insert race).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Created(Uuid),
    Existing(Uuid),
}

impl Resolution {
    pub fn id(&self) -> Uuid {
        match self {
            Resolution::Created(id) | Resolution::Existing(id) => *id,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Resolution::Created(_))
    }
}

pub struct ParentResolver;

impl ParentResolver {
    /// Resolve by phone (first) or email against active parents; create
    /// atomically when unmatched. A match refreshes mutable profile fields
    /// but never identity fields or the stored name.
    pub async fn resolve_or_create<S: Store>(
        store: &S,
        candidate: &ParentCandidate,
    ) -> Result<Resolution, IngestError> {
        if !candidate.has_contact_method() {
            return Err(IngestError::IntegrityViolation(
                "parent candidate has no contact method".into(),
            ));
        }

        let phone = candidate.phone_number.as_deref();
        let email = candidate.email.as_deref();

        if let Some(parent) = store.find_parent_by_phone_or_email(phone, email).await? {
            store.refresh_parent_profile(parent.id, candidate).await?;
            return Ok(Resolution::Existing(parent.id));
        }

        match store.insert_parent(candidate).await? {
            InsertOutcome::Created(id) => Ok(Resolution::Created(id)),
            InsertOutcome::Conflict => {
                // A concurrent run created this parent between our lookup and
                // insert; the winning row is authoritative.
                match store.find_parent_by_phone_or_email(phone, email).await? {
                    Some(parent) => Ok(Resolution::Existing(parent.id)),
                    None => Err(IngestError::Conflict {
                        constraint: "parents contact identity".into(),
                    }),
                }
            }
        }
    }
}

pub struct ChildResolver;

impl ChildResolver {
    /// Resolve by (parent, case-insensitive name, age). The effective age is
    /// the explicit one, else derived from birthdate as of `as_of`; bracket
    /// and relationship are derived before persistence, never at read time.
    ///
    /// A matched row is reused as-is; candidate attributes only apply to a
    /// newly created record. A changed age therefore creates a new child —
    /// a documented limitation of the exact-age natural key.
    pub async fn resolve_or_create<S: Store>(
        store: &S,
        parent_id: Uuid,
        candidate: &ChildCandidate,
        as_of: NaiveDate,
    ) -> Result<Resolution, IngestError> {
        let age = match candidate.age {
            Some(age) => age,
            None => {
                let birth_date = candidate.birth_date.ok_or_else(|| {
                    IngestError::IntegrityViolation(
                        "child candidate has neither age nor birth date".into(),
                    )
                })?;
                age_from_birthdate(birth_date, as_of)
            }
        };

        if let Some(child) = store.find_child(parent_id, &candidate.full_name, age).await? {
            return Ok(Resolution::Existing(child.id));
        }

        let new_child = NewChild {
            parent_id,
            full_name: candidate.full_name.clone(),
            birth_date: candidate.birth_date,
            age,
            age_bracket: age_bracket(Some(age)),
            gender: candidate.gender,
            special_needs: candidate.special_needs.clone(),
            allergies: candidate.allergies.clone(),
            relationship_to_parent: relationship_or_default(
                candidate.relationship_to_parent.as_deref(),
                candidate.gender,
            ),
        };

        match store.insert_child(&new_child).await? {
            InsertOutcome::Created(id) => Ok(Resolution::Created(id)),
            InsertOutcome::Conflict => {
                match store.find_child(parent_id, &candidate.full_name, age).await? {
                    Some(child) => Ok(Resolution::Existing(child.id)),
                    None => Err(IngestError::Conflict {
                        constraint: "children natural key".into(),
                    }),
                }
            }
        }
    }
}

pub struct AttendanceRecorder;

impl AttendanceRecorder {
    /// Idempotent presence record: the store's upsert guarantees exactly one
    /// row per (child, service, date) no matter how often this is replayed.
    pub async fn record<S: Store>(
        store: &S,
        event: &NewAttendance,
    ) -> Result<RecordedAttendance, IngestError> {
        store.upsert_attendance(event).await
    }
}
