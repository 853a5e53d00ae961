//! Storage seam for the ingestion engine.
//!
//! The resolvers only ever talk to this trait. Both implementations enforce
//! the same natural-key constraints: (phone | email) for parents,
//! (parent, UPPER(name), age) for children, (child, service, date) for
//! attendance. Uniqueness at this layer is the engine's only synchronization
//! mechanism; concurrent workers racing on a key converge via the insert
//! conflict, never a lock.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::IngestError;
use crate::models::{
    attendance::NewAttendance,
    child::{Child, NewChild},
    parent::{Parent, ParentCandidate},
};

pub mod memory;
pub mod postgres;

#[cfg(test)]
mod tests;

/// Outcome of a conflict-aware insert against a natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(Uuid),
    /// Lost a race on the key; the caller re-queries and uses the winner.
    Conflict,
}

/// Result of an attendance upsert. `inserted` distinguishes a fresh row from
/// an idempotent replay for batch-report counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedAttendance {
    pub id: Uuid,
    pub inserted: bool,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Locate an active parent by contact identity: phone checked before
    /// email, first non-null match wins. More than one active row for a
    /// single key is an `AmbiguousMatch`.
    async fn find_parent_by_phone_or_email(
        &self,
        phone: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Parent>, IngestError>;

    /// Atomic insert-or-conflict on the parent's contact identity.
    async fn insert_parent(
        &self,
        candidate: &ParentCandidate,
    ) -> Result<InsertOutcome, IngestError>;

    /// Refresh mutable profile fields (role, department, address, secondary
    /// phone) on a matched parent. Identity fields and the stored name are
    /// never touched.
    async fn refresh_parent_profile(
        &self,
        id: Uuid,
        candidate: &ParentCandidate,
    ) -> Result<(), IngestError>;

    /// Exact match on the child natural key: case-insensitive name, exact age.
    async fn find_child(
        &self,
        parent_id: Uuid,
        full_name: &str,
        age: i32,
    ) -> Result<Option<Child>, IngestError>;

    /// Atomic insert-or-conflict on (parent, UPPER(name), age).
    async fn insert_child(&self, child: &NewChild) -> Result<InsertOutcome, IngestError>;

    /// Insert one presence event, or on (child, service, date) conflict set
    /// the existing row present in place. Check-in/out times are only ever
    /// set if not already set, so an earlier, more specific check-in is
    /// never clobbered by a replay.
    async fn upsert_attendance(
        &self,
        event: &NewAttendance,
    ) -> Result<RecordedAttendance, IngestError>;
}
