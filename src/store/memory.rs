//! In-memory implementation of the `Store` trait.
//!
//! Enforces the same natural-key constraints as the Postgres backend inside
//! a single write lock, so the insert-or-conflict semantics match. Used by
//! the test suite; data is lost on drop.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::IngestError;
use crate::models::{
    attendance::{Attendance, NewAttendance},
    child::{Child, NewChild},
    parent::{Parent, ParentCandidate},
};

use super::{InsertOutcome, RecordedAttendance, Store};

#[derive(Default)]
struct Inner {
    parents: HashMap<Uuid, Parent>,
    children: HashMap<Uuid, Child>,
    attendance: HashMap<Uuid, Attendance>,
}

#[derive(Clone, Default)]
pub struct MemStore {
    inner: Arc<RwLock<Inner>>,
}

fn parent_row(candidate: &ParentCandidate) -> Parent {
    let now = Utc::now();
    Parent {
        id: Uuid::new_v4(),
        full_name: candidate.full_name.clone(),
        gender: candidate.gender.to_string(),
        email: candidate.email.clone(),
        phone_number: candidate.phone_number.clone(),
        secondary_phone_number: candidate.secondary_phone_number.clone(),
        role_in_church: candidate.role_in_church.clone(),
        department_in_church: candidate.department_in_church.clone(),
        address: candidate.address.clone(),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parent_count(&self) -> usize {
        self.inner.read().parents.len()
    }

    pub fn child_count(&self) -> usize {
        self.inner.read().children.len()
    }

    pub fn attendance_count(&self) -> usize {
        self.inner.read().attendance.len()
    }

    pub fn get_parent(&self, id: Uuid) -> Option<Parent> {
        self.inner.read().parents.get(&id).cloned()
    }

    pub fn get_child(&self, id: Uuid) -> Option<Child> {
        self.inner.read().children.get(&id).cloned()
    }

    pub fn get_attendance(&self, id: Uuid) -> Option<Attendance> {
        self.inner.read().attendance.get(&id).cloned()
    }

    /// Test helper: any stored parent (order unspecified).
    pub fn any_parent(&self) -> Option<Parent> {
        self.inner.read().parents.values().next().cloned()
    }

    /// Test helper: id of the first child with this exact name.
    pub fn find_child_id_by_name(&self, full_name: &str) -> Option<Uuid> {
        self.inner
            .read()
            .children
            .values()
            .find(|c| c.full_name == full_name)
            .map(|c| c.id)
    }
}

#[cfg(test)]
impl MemStore {
    /// Test seeding: inserts without the contact-identity conflict check, to
    /// set up the duplicate-active-key anomaly the resolvers must surface.
    pub fn seed_parent_unchecked(&self, candidate: &ParentCandidate) -> Uuid {
        let row = parent_row(candidate);
        let id = row.id;
        self.inner.write().parents.insert(id, row);
        id
    }
}

fn parent_matches(p: &Parent, value: &str, key: ParentKey) -> bool {
    if !p.is_active {
        return false;
    }
    let field = match key {
        ParentKey::Phone => p.phone_number.as_deref(),
        ParentKey::Email => p.email.as_deref(),
    };
    field == Some(value)
}

#[derive(Clone, Copy)]
enum ParentKey {
    Phone,
    Email,
}

fn find_one_parent(
    inner: &Inner,
    value: &str,
    key: ParentKey,
) -> Result<Option<Parent>, IngestError> {
    let matches: Vec<&Parent> = inner
        .parents
        .values()
        .filter(|p| parent_matches(p, value, key))
        .collect();
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches[0].clone())),
        n => Err(IngestError::AmbiguousMatch {
            entity: "parent",
            key: value.to_string(),
            count: n,
        }),
    }
}

fn child_key_taken(inner: &Inner, parent_id: Uuid, full_name: &str, age: i32) -> bool {
    inner.children.values().any(|c| {
        c.parent_id == parent_id
            && c.full_name.to_uppercase() == full_name.to_uppercase()
            && c.age == age
    })
}

#[async_trait]
impl Store for MemStore {
    async fn find_parent_by_phone_or_email(
        &self,
        phone: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Parent>, IngestError> {
        let inner = self.inner.read();
        if let Some(phone) = phone {
            if let Some(p) = find_one_parent(&inner, phone, ParentKey::Phone)? {
                return Ok(Some(p));
            }
        }
        if let Some(email) = email {
            if let Some(p) = find_one_parent(&inner, email, ParentKey::Email)? {
                return Ok(Some(p));
            }
        }
        Ok(None)
    }

    async fn insert_parent(
        &self,
        candidate: &ParentCandidate,
    ) -> Result<InsertOutcome, IngestError> {
        if !candidate.has_contact_method() {
            return Err(IngestError::IntegrityViolation(
                "parent candidate has no contact method".into(),
            ));
        }

        let mut inner = self.inner.write();

        // Same conflict surface as the partial unique indexes in Postgres.
        let conflicted = inner.parents.values().any(|p| {
            (candidate.phone_number.is_some()
                && p.phone_number == candidate.phone_number)
                || (candidate.email.is_some() && p.email == candidate.email)
        });
        if conflicted {
            return Ok(InsertOutcome::Conflict);
        }

        let row = parent_row(candidate);
        let id = row.id;
        inner.parents.insert(id, row);
        Ok(InsertOutcome::Created(id))
    }

    async fn refresh_parent_profile(
        &self,
        id: Uuid,
        candidate: &ParentCandidate,
    ) -> Result<(), IngestError> {
        let mut inner = self.inner.write();
        if let Some(p) = inner.parents.get_mut(&id) {
            if candidate.role_in_church.is_some() {
                p.role_in_church = candidate.role_in_church.clone();
            }
            if candidate.department_in_church.is_some() {
                p.department_in_church = candidate.department_in_church.clone();
            }
            if candidate.address.is_some() {
                p.address = candidate.address.clone();
            }
            if candidate.secondary_phone_number.is_some() {
                p.secondary_phone_number = candidate.secondary_phone_number.clone();
            }
            p.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_child(
        &self,
        parent_id: Uuid,
        full_name: &str,
        age: i32,
    ) -> Result<Option<Child>, IngestError> {
        let inner = self.inner.read();
        let matches: Vec<&Child> = inner
            .children
            .values()
            .filter(|c| {
                c.is_active
                    && c.parent_id == parent_id
                    && c.full_name.to_uppercase() == full_name.to_uppercase()
                    && c.age == age
            })
            .collect();
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches[0].clone())),
            n => Err(IngestError::AmbiguousMatch {
                entity: "child",
                key: format!("parent={parent_id} name={full_name} age={age}"),
                count: n,
            }),
        }
    }

    async fn insert_child(&self, child: &NewChild) -> Result<InsertOutcome, IngestError> {
        let mut inner = self.inner.write();
        if child_key_taken(&inner, child.parent_id, &child.full_name, child.age) {
            return Ok(InsertOutcome::Conflict);
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        inner.children.insert(
            id,
            Child {
                id,
                parent_id: child.parent_id,
                full_name: child.full_name.clone(),
                birth_date: child.birth_date,
                age: child.age,
                age_bracket: child.age_bracket.to_string(),
                gender: child.gender.to_string(),
                special_needs: child.special_needs.clone(),
                allergies: child.allergies.clone(),
                relationship_to_parent: child.relationship_to_parent.clone(),
                is_active: true,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(InsertOutcome::Created(id))
    }

    async fn upsert_attendance(
        &self,
        event: &NewAttendance,
    ) -> Result<RecordedAttendance, IngestError> {
        let mut inner = self.inner.write();

        if let Some(a) = inner.attendance.values_mut().find(|a| {
            a.child_id == event.child_id
                && a.service_name == event.service.as_str()
                && a.attendance_date == event.attendance_date
        }) {
            // Validate the pair as it would stand after the merge, exactly
            // what the Postgres CHECK constraint sees after its COALESCEs.
            let merged_in = a.check_in_time.or(event.check_in_time);
            let merged_out = a.check_out_time.or(event.check_out_time);
            if let (Some(cin), Some(cout)) = (merged_in, merged_out) {
                if cout < cin {
                    return Err(IngestError::IntegrityViolation(
                        "check-out before check-in".into(),
                    ));
                }
            }
            a.was_present = true;
            a.check_in_time = merged_in;
            a.check_out_time = merged_out;
            return Ok(RecordedAttendance {
                id: a.id,
                inserted: false,
            });
        }

        if let (Some(cin), Some(cout)) = (event.check_in_time, event.check_out_time) {
            if cout < cin {
                return Err(IngestError::IntegrityViolation(
                    "check-out before check-in".into(),
                ));
            }
        }

        let id = Uuid::new_v4();
        inner.attendance.insert(
            id,
            Attendance {
                id,
                child_id: event.child_id,
                service_name: event.service.as_str().to_string(),
                attendance_date: event.attendance_date,
                check_in_time: event.check_in_time,
                check_out_time: event.check_out_time,
                was_present: true,
                recorded_by: event.recorded_by.clone(),
                notes: event.notes.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(RecordedAttendance { id, inserted: true })
    }
}
