//! PostgreSQL implementation of the `Store` trait.
//!
//! Uniqueness is enforced by the indexes provisioned in `db::provision_schema`;
//! every mutating operation is a single statement, so two ingestion runs
//! racing on the same key converge through `ON CONFLICT` rather than
//! check-then-insert.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::IngestError;
use crate::models::{
    attendance::NewAttendance,
    child::{Child, NewChild},
    parent::{Parent, ParentCandidate},
};

use super::{InsertOutcome, RecordedAttendance, Store};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find_active_parent(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<Parent>, IngestError> {
        // column is one of two literals below, never user input
        let rows = sqlx::query_as::<_, Parent>(&format!(
            "SELECT * FROM parents WHERE {column} = $1 AND is_active = TRUE"
        ))
        .bind(value)
        .fetch_all(&self.pool)
        .await?;

        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.into_iter().next()),
            n => Err(IngestError::AmbiguousMatch {
                entity: "parent",
                key: format!("{column}={value}"),
                count: n,
            }),
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_parent_by_phone_or_email(
        &self,
        phone: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Parent>, IngestError> {
        if let Some(phone) = phone {
            if let Some(parent) = self.find_active_parent("phone_number", phone).await? {
                return Ok(Some(parent));
            }
        }
        if let Some(email) = email {
            if let Some(parent) = self.find_active_parent("email", email).await? {
                return Ok(Some(parent));
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

        // DO NOTHING rather than DO UPDATE: the conflict may be on either
        // the phone or the email index, and the caller re-queries for the
        // winner either way.
        let id: Option<Uuid> = sqlx::query_scalar(
            "INSERT INTO parents
                (full_name, gender, email, phone_number, secondary_phone_number,
                 role_in_church, department_in_church, address)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT DO NOTHING
             RETURNING id",
        )
        .bind(&candidate.full_name)
        .bind(candidate.gender.to_string())
        .bind(&candidate.email)
        .bind(&candidate.phone_number)
        .bind(&candidate.secondary_phone_number)
        .bind(&candidate.role_in_church)
        .bind(&candidate.department_in_church)
        .bind(&candidate.address)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match id {
            Some(id) => InsertOutcome::Created(id),
            None => InsertOutcome::Conflict,
        })
    }

    async fn refresh_parent_profile(
        &self,
        id: Uuid,
        candidate: &ParentCandidate,
    ) -> Result<(), IngestError> {
        sqlx::query(
            "UPDATE parents
             SET role_in_church         = COALESCE($1, role_in_church),
                 department_in_church   = COALESCE($2, department_in_church),
                 address                = COALESCE($3, address),
                 secondary_phone_number = COALESCE($4, secondary_phone_number),
                 updated_at             = NOW()
             WHERE id = $5",
        )
        .bind(&candidate.role_in_church)
        .bind(&candidate.department_in_church)
        .bind(&candidate.address)
        .bind(&candidate.secondary_phone_number)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_child(
        &self,
        parent_id: Uuid,
        full_name: &str,
        age: i32,
    ) -> Result<Option<Child>, IngestError> {
        let rows = sqlx::query_as::<_, Child>(
            "SELECT * FROM children
             WHERE parent_id = $1 AND UPPER(full_name) = UPPER($2) AND age = $3
               AND is_active = TRUE",
        )
        .bind(parent_id)
        .bind(full_name)
        .bind(age)
        .fetch_all(&self.pool)
        .await?;

        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.into_iter().next()),
            n => Err(IngestError::AmbiguousMatch {
                entity: "child",
                key: format!("parent={parent_id} name={full_name} age={age}"),
                count: n,
            }),
        }
    }

    async fn insert_child(&self, child: &NewChild) -> Result<InsertOutcome, IngestError> {
        let id: Option<Uuid> = sqlx::query_scalar(
            "INSERT INTO children
                (parent_id, full_name, birth_date, age, age_bracket, gender,
                 special_needs, allergies, relationship_to_parent)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (parent_id, UPPER(full_name), age) DO NOTHING
             RETURNING id",
        )
        .bind(child.parent_id)
        .bind(&child.full_name)
        .bind(child.birth_date)
        .bind(child.age)
        .bind(child.age_bracket.to_string())
        .bind(child.gender.to_string())
        .bind(&child.special_needs)
        .bind(&child.allergies)
        .bind(&child.relationship_to_parent)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match id {
            Some(id) => InsertOutcome::Created(id),
            None => InsertOutcome::Conflict,
        })
    }

    async fn upsert_attendance(
        &self,
        event: &NewAttendance,
    ) -> Result<RecordedAttendance, IngestError> {
        // xmax = 0 distinguishes a fresh insert from a conflict update.
        let row = sqlx::query(
            "INSERT INTO attendance
                (child_id, service_name, attendance_date, check_in_time,
                 check_out_time, was_present, recorded_by, notes)
             VALUES ($1, $2, $3, $4, $5, TRUE, $6, $7)
             ON CONFLICT (child_id, service_name, attendance_date) DO UPDATE
             SET was_present    = TRUE,
                 check_in_time  = COALESCE(attendance.check_in_time, EXCLUDED.check_in_time),
                 check_out_time = COALESCE(attendance.check_out_time, EXCLUDED.check_out_time)
             RETURNING id, (xmax = 0) AS inserted",
        )
        .bind(event.child_id)
        .bind(event.service.as_str())
        .bind(event.attendance_date)
        .bind(event.check_in_time)
        .bind(event.check_out_time)
        .bind(&event.recorded_by)
        .bind(&event.notes)
        .fetch_one(&self.pool)
        .await?;

        Ok(RecordedAttendance {
            id: row.try_get("id").map_err(IngestError::Storage)?,
            inserted: row.try_get("inserted").map_err(IngestError::Storage)?,
        })
    }
}
