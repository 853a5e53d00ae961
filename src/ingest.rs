//! Batch orchestrator: drives each submission row through normalize →
//! parent resolution → child resolution → attendance recording.
//!
//! Rows are independent. A failure at any stage aborts that row only and is
//! recorded in the report; completed rows are already durably committed, so
//! a batch can be stopped and replayed without corrupting state.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::IngestError;
use crate::models::attendance::NewAttendance;
use crate::normalize::{normalize_row, RawRow};
use crate::resolve::{AttendanceRecorder, ChildResolver, ParentResolver};
use crate::store::Store;

/// A row the batch could not process, with the operator-facing reason.
#[derive(Debug, Clone, Serialize)]
pub struct RowIssue {
    /// 1-based row number within the batch.
    pub row: usize,
    pub reason: String,
}

/// Outcome of one batch run, mirroring the stats the weekly pipeline logs.
/// Serializable so the binaries can emit it as one JSON line for operator
/// review.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub new_parents: usize,
    pub existing_parents: usize,
    pub new_children: usize,
    pub existing_children: usize,
    pub attendance_recorded: usize,
    /// Rows rejected by validation; operator fixes the sheet and resubmits.
    pub skipped: Vec<RowIssue>,
    /// Rows that hit storage or integrity faults; resubmit after the fault
    /// clears. The orchestrator never retries within a run.
    pub failed: Vec<RowIssue>,
    /// Non-fatal cleanups (gender coercions etc.), prefixed with row number.
    pub warnings: Vec<String>,
}

impl BatchReport {
    pub fn log_summary(&self) {
        info!(
            total = self.total,
            succeeded = self.succeeded,
            new_parents = self.new_parents,
            existing_parents = self.existing_parents,
            new_children = self.new_children,
            existing_children = self.existing_children,
            attendance_recorded = self.attendance_recorded,
            skipped = self.skipped.len(),
            failed = self.failed.len(),
            "batch complete"
        );
        for issue in &self.skipped {
            warn!(row = issue.row, "skipped: {}", issue.reason);
        }
        for issue in &self.failed {
            warn!(row = issue.row, "failed: {}", issue.reason);
        }
    }
}

struct RowStats {
    new_parents: usize,
    existing_parents: usize,
    new_children: usize,
    existing_children: usize,
    attendance_recorded: usize,
}

async fn process_row<S: Store>(
    store: &S,
    raw: &RawRow,
    as_of: NaiveDate,
    recorded_by: Option<&str>,
    warnings: &mut Vec<String>,
) -> Result<RowStats, IngestError> {
    let submission = normalize_row(raw, as_of)?;
    warnings.extend(submission.warnings.iter().cloned());

    let mut stats = RowStats {
        new_parents: 0,
        existing_parents: 0,
        new_children: 0,
        existing_children: 0,
        attendance_recorded: 0,
    };

    let parent = ParentResolver::resolve_or_create(store, &submission.parent).await?;
    if parent.was_created() {
        stats.new_parents += 1;
        info!(parent_id = %parent.id(), name = %submission.parent.full_name, "created parent");
    } else {
        stats.existing_parents += 1;
    }

    for candidate in &submission.children {
        let child =
            ChildResolver::resolve_or_create(store, parent.id(), candidate, as_of).await?;
        if child.was_created() {
            stats.new_children += 1;
            info!(child_id = %child.id(), name = %candidate.full_name, "created child");
        } else {
            stats.existing_children += 1;
        }

        let recorded = AttendanceRecorder::record(
            store,
            &NewAttendance {
                child_id: child.id(),
                service: submission.service,
                attendance_date: submission.attendance_date,
                check_in_time: None,
                check_out_time: None,
                recorded_by: recorded_by.map(str::to_string),
                notes: None,
            },
        )
        .await?;
        if recorded.inserted {
            stats.attendance_recorded += 1;
        } else {
            info!(
                child_id = %child.id(),
                service = %submission.service,
                date = %submission.attendance_date,
                "attendance already recorded"
            );
        }
    }

    Ok(stats)
}

/// Run one batch. `as_of` is the processing date used for missing timestamps
/// and birthdate-derived ages; passing it explicitly keeps runs reproducible.
pub async fn ingest_batch<S: Store>(
    store: &S,
    rows: &[RawRow],
    as_of: NaiveDate,
    recorded_by: Option<&str>,
) -> BatchReport {
    let mut report = BatchReport {
        total: rows.len(),
        ..Default::default()
    };

    for (idx, raw) in rows.iter().enumerate() {
        let row_no = idx + 1;
        let mut row_warnings = Vec::new();

        match process_row(store, raw, as_of, recorded_by, &mut row_warnings).await {
            Ok(stats) => {
                report.succeeded += 1;
                report.new_parents += stats.new_parents;
                report.existing_parents += stats.existing_parents;
                report.new_children += stats.new_children;
                report.existing_children += stats.existing_children;
                report.attendance_recorded += stats.attendance_recorded;
            }
            Err(err) if err.is_validation() => {
                warn!(row = row_no, "skipping row: {err}");
                report.skipped.push(RowIssue {
                    row: row_no,
                    reason: err.to_string(),
                });
            }
            Err(err) => {
                warn!(row = row_no, "row failed: {err}");
                report.failed.push(RowIssue {
                    row: row_no,
                    reason: err.to_string(),
                });
            }
        }

        report
            .warnings
            .extend(row_warnings.into_iter().map(|w| format!("row {row_no}: {w}")));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemStore;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 7).unwrap()
    }

    fn jane_doe_row() -> RawRow {
        RawRow {
            timestamp: "1/7/2024 09:15:00".into(),
            parent_name: "Jane Doe".into(),
            parent_phone: "08011112222".into(),
            parent_gender: "Female".into(),
            service: "Second Service".into(),
            child1_name: "Tom Doe".into(),
            child1_age: "5".into(),
            child1_gender: "Male".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn single_row_creates_parent_child_and_attendance() {
        let store = MemStore::new();
        let report = ingest_batch(&store, &[jane_doe_row()], as_of(), None).await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.new_parents, 1);
        assert_eq!(report.new_children, 1);
        assert_eq!(report.attendance_recorded, 1);
        assert_eq!(store.parent_count(), 1);
        assert_eq!(store.child_count(), 1);
        assert_eq!(store.attendance_count(), 1);
    }

    #[tokio::test]
    async fn replaying_a_batch_is_idempotent() {
        let store = MemStore::new();
        let rows = [jane_doe_row()];

        let first = ingest_batch(&store, &rows, as_of(), None).await;
        let second = ingest_batch(&store, &rows, as_of(), None).await;

        assert_eq!(first.new_parents, 1);
        assert_eq!(second.new_parents, 0);
        assert_eq!(second.existing_parents, 1);
        assert_eq!(second.existing_children, 1);
        assert_eq!(second.attendance_recorded, 0);

        assert_eq!(store.parent_count(), 1);
        assert_eq!(store.child_count(), 1);
        assert_eq!(store.attendance_count(), 1);
    }

    #[tokio::test]
    async fn derived_fields_are_stored_on_the_child() {
        let store = MemStore::new();
        ingest_batch(&store, &[jane_doe_row()], as_of(), None).await;

        let id = store.find_child_id_by_name("Tom Doe").expect("child stored");
        let child = store.get_child(id).unwrap();
        assert_eq!(child.age_bracket, "Kindergarten (3-5 years)");
        assert_eq!(child.relationship_to_parent, "Son");
        assert_eq!(child.gender, "Male");
    }

    #[tokio::test]
    async fn same_phone_different_name_spelling_resolves_to_same_parent() {
        let store = MemStore::new();
        let mut respelled = jane_doe_row();
        respelled.parent_name = "JANE  DOE".into();

        ingest_batch(&store, &[jane_doe_row()], as_of(), None).await;
        let second = ingest_batch(&store, &[respelled], as_of(), None).await;

        assert_eq!(second.existing_parents, 1);
        assert_eq!(store.parent_count(), 1);
        // The stored name is not required to change on a re-match.
        let parent = store.any_parent().unwrap();
        assert_eq!(parent.full_name, "Jane Doe");
    }

    #[tokio::test]
    async fn invalid_gender_is_coerced_and_row_still_processed() {
        let store = MemStore::new();
        let mut row = jane_doe_row();
        row.parent_gender = "Other".into();

        let report = ingest_batch(&store, &[row], as_of(), None).await;

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("defaulting to Male"));
        let parent = store.any_parent().unwrap();
        assert_eq!(parent.gender, "Male");
    }

    #[tokio::test]
    async fn age_change_creates_a_second_child_record() {
        let store = MemStore::new();
        let mut next_week = jane_doe_row();
        next_week.timestamp = "1/14/2024 09:15:00".into();
        next_week.child1_age = "6".into();

        ingest_batch(&store, &[jane_doe_row()], as_of(), None).await;
        let second = ingest_batch(
            &store,
            &[next_week],
            NaiveDate::from_ymd_opt(2024, 1, 14).unwrap(),
            None,
        )
        .await;

        // Exact-age natural key: a changed age is a new record by design.
        assert_eq!(second.new_children, 1);
        assert_eq!(store.child_count(), 2);
        assert_eq!(store.parent_count(), 1);
        assert_eq!(store.attendance_count(), 2);
    }

    #[tokio::test]
    async fn bad_row_does_not_abort_the_batch() {
        let store = MemStore::new();
        let mut bad = jane_doe_row();
        bad.service = "Midnight Service".into();
        let mut other_family = jane_doe_row();
        other_family.parent_name = "Ada Obi".into();
        other_family.parent_phone = "08033334444".into();

        let report = ingest_batch(&store, &[bad, jane_doe_row(), other_family], as_of(), None).await;

        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].row, 1);
        assert_eq!(store.parent_count(), 2);
    }

    #[tokio::test]
    async fn partial_child_slots_create_one_child_only() {
        let store = MemStore::new();
        let report = ingest_batch(&store, &[jane_doe_row()], as_of(), None).await;

        assert_eq!(report.new_children, 1);
        assert_eq!(store.child_count(), 1);
        assert_eq!(store.attendance_count(), 1);
    }

    #[tokio::test]
    async fn three_children_row_records_three_attendance_events() {
        let store = MemStore::new();
        let mut row = jane_doe_row();
        row.child2_name = "Ann Doe".into();
        row.child2_age = "8".into();
        row.child2_gender = "Female".into();
        row.child3_name = "Ben Doe".into();
        row.child3_age = "11".into();
        row.child3_gender = "Male".into();

        let report = ingest_batch(&store, &[row], as_of(), None).await;

        assert_eq!(report.new_children, 3);
        assert_eq!(report.attendance_recorded, 3);
        assert_eq!(store.attendance_count(), 3);
    }

    #[tokio::test]
    async fn birthdate_only_child_gets_derived_age() {
        let store = MemStore::new();
        let mut row = jane_doe_row();
        row.child1_age = String::new();
        row.child1_birth_date = "2019-06-15".into();

        let report = ingest_batch(&store, &[row], as_of(), None).await;

        assert_eq!(report.succeeded, 1);
        let id = store.find_child_id_by_name("Tom Doe").unwrap();
        let child = store.get_child(id).unwrap();
        assert_eq!(child.age, 4);
        assert_eq!(child.age_bracket, "Kindergarten (3-5 years)");
    }

    #[tokio::test]
    async fn ambiguous_parent_match_fails_only_that_row() {
        let store = MemStore::new();

        // Two active parents sharing one phone is an upstream data-integrity
        // anomaly; the engine must surface it, never pick a winner.
        let shared_phone = crate::models::parent::ParentCandidate {
            full_name: "Jane Doe".into(),
            gender: crate::models::Gender::Female,
            email: None,
            phone_number: Some("08011112222".into()),
            secondary_phone_number: None,
            role_in_church: None,
            department_in_church: None,
            address: None,
        };
        store.seed_parent_unchecked(&shared_phone);
        store.seed_parent_unchecked(&shared_phone);

        let mut other_family = jane_doe_row();
        other_family.parent_name = "Ada Obi".into();
        other_family.parent_phone = "08033334444".into();

        let report = ingest_batch(&store, &[jane_doe_row(), other_family], as_of(), None).await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].row, 1);
        assert!(report.failed[0].reason.contains("ambiguous match for parent"));
        assert!(report.skipped.is_empty());
        // The anomaly is row-scoped; the healthy row still lands.
        assert_eq!(report.succeeded, 1);
        assert_eq!(store.parent_count(), 3);
    }

    #[tokio::test]
    async fn batch_report_serializes_for_operator_review() {
        let store = MemStore::new();
        let mut bad = jane_doe_row();
        bad.service = "Midnight Service".into();

        let report = ingest_batch(&store, &[jane_doe_row(), bad], as_of(), None).await;
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["total"], 2);
        assert_eq!(json["succeeded"], 1);
        assert_eq!(json["new_parents"], 1);
        assert_eq!(json["attendance_recorded"], 1);
        assert_eq!(json["skipped"][0]["row"], 2);
        assert!(json["skipped"][0]["reason"]
            .as_str()
            .unwrap()
            .contains("unrecognized service"));
    }
}
