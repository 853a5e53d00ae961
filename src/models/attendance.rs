use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::Service;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Attendance {
    pub id: Uuid,
    pub child_id: Uuid,
    pub service_name: String,
    pub attendance_date: NaiveDate,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,
    pub was_present: bool,
    pub recorded_by: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One presence event to upsert. (child, service, date) is the unique key;
/// replaying the same event must not create a second row.
#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub child_id: Uuid,
    pub service: Service,
    pub attendance_date: NaiveDate,
    pub check_in_time: Option<NaiveTime>,
    pub check_out_time: Option<NaiveTime>,
    pub recorded_by: Option<String>,
    pub notes: Option<String>,
}
