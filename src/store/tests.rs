use chrono::{NaiveDate, NaiveTime};
use rstest::{fixture, rstest};
use uuid::Uuid;

use crate::error::IngestError;
use crate::models::{
    attendance::NewAttendance,
    child::NewChild,
    parent::ParentCandidate,
    Gender, Service,
};
use crate::resolve::{ChildResolver, ParentResolver, Resolution};
use crate::store::{memory::MemStore, InsertOutcome, Store};

fn jane() -> ParentCandidate {
    ParentCandidate {
        full_name: "Jane Doe".into(),
        gender: Gender::Female,
        email: Some("jane@example.com".into()),
        phone_number: Some("08011112222".into()),
        secondary_phone_number: None,
        role_in_church: Some("Usher".into()),
        department_in_church: None,
        address: None,
    }
}

fn tom(parent_id: Uuid) -> NewChild {
    NewChild {
        parent_id,
        full_name: "Tom Doe".into(),
        birth_date: None,
        age: 5,
        age_bracket: crate::derive::age_bracket(Some(5)),
        gender: Gender::Male,
        special_needs: None,
        allergies: None,
        relationship_to_parent: "Son".into(),
    }
}

fn service_event(child_id: Uuid) -> NewAttendance {
    NewAttendance {
        child_id,
        service: Service::First,
        attendance_date: NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
        check_in_time: None,
        check_out_time: None,
        recorded_by: None,
        notes: None,
    }
}

#[fixture]
fn store() -> MemStore {
    MemStore::new()
}

#[rstest]
#[tokio::test]
async fn duplicate_parent_insert_conflicts(store: MemStore) {
    let first = store.insert_parent(&jane()).await.unwrap();
    assert!(matches!(first, InsertOutcome::Created(_)));

    let second = store.insert_parent(&jane()).await.unwrap();
    assert_eq!(second, InsertOutcome::Conflict);
    assert_eq!(store.parent_count(), 1);
}

#[rstest]
#[tokio::test]
async fn parent_lookup_checks_phone_before_email(store: MemStore) {
    let InsertOutcome::Created(id) = store.insert_parent(&jane()).await.unwrap() else {
        panic!("insert failed");
    };

    let by_phone = store
        .find_parent_by_phone_or_email(Some("08011112222"), None)
        .await
        .unwrap();
    assert_eq!(by_phone.map(|p| p.id), Some(id));

    // Unknown phone falls through to the email key.
    let by_email = store
        .find_parent_by_phone_or_email(Some("00000000000"), Some("jane@example.com"))
        .await
        .unwrap();
    assert_eq!(by_email.map(|p| p.id), Some(id));

    let miss = store
        .find_parent_by_phone_or_email(Some("00000000000"), Some("nobody@example.com"))
        .await
        .unwrap();
    assert!(miss.is_none());
}

#[rstest]
#[tokio::test]
async fn parent_without_contact_method_is_rejected(store: MemStore) {
    let mut candidate = jane();
    candidate.phone_number = None;
    candidate.email = None;
    candidate.secondary_phone_number = None;

    let err = store.insert_parent(&candidate).await.unwrap_err();
    assert!(matches!(err, IngestError::IntegrityViolation(_)));
}

#[rstest]
#[tokio::test]
async fn profile_refresh_never_touches_identity_fields(store: MemStore) {
    let InsertOutcome::Created(id) = store.insert_parent(&jane()).await.unwrap() else {
        panic!("insert failed");
    };

    let mut update = jane();
    update.full_name = "Janet Doe".into();
    update.phone_number = Some("09099998888".into());
    update.role_in_church = Some("Deacon".into());
    update.address = Some("12 Church Rd".into());
    store.refresh_parent_profile(id, &update).await.unwrap();

    let parent = store.get_parent(id).unwrap();
    assert_eq!(parent.full_name, "Jane Doe");
    assert_eq!(parent.phone_number.as_deref(), Some("08011112222"));
    assert_eq!(parent.role_in_church.as_deref(), Some("Deacon"));
    assert_eq!(parent.address.as_deref(), Some("12 Church Rd"));
}

#[rstest]
#[tokio::test]
async fn child_match_is_case_insensitive_on_name(store: MemStore) {
    let InsertOutcome::Created(parent_id) = store.insert_parent(&jane()).await.unwrap() else {
        panic!("insert failed");
    };
    let InsertOutcome::Created(child_id) = store.insert_child(&tom(parent_id)).await.unwrap()
    else {
        panic!("insert failed");
    };

    let found = store.find_child(parent_id, "TOM DOE", 5).await.unwrap();
    assert_eq!(found.map(|c| c.id), Some(child_id));

    // Same name, different age: not the same child.
    let other_age = store.find_child(parent_id, "Tom Doe", 6).await.unwrap();
    assert!(other_age.is_none());
}

#[rstest]
#[tokio::test]
async fn duplicate_child_insert_conflicts(store: MemStore) {
    let InsertOutcome::Created(parent_id) = store.insert_parent(&jane()).await.unwrap() else {
        panic!("insert failed");
    };
    store.insert_child(&tom(parent_id)).await.unwrap();

    let mut shouty = tom(parent_id);
    shouty.full_name = "TOM DOE".into();
    let second = store.insert_child(&shouty).await.unwrap();
    assert_eq!(second, InsertOutcome::Conflict);
    assert_eq!(store.child_count(), 1);
}

#[rstest]
#[tokio::test]
async fn attendance_upsert_is_idempotent(store: MemStore) {
    let InsertOutcome::Created(parent_id) = store.insert_parent(&jane()).await.unwrap() else {
        panic!("insert failed");
    };
    let InsertOutcome::Created(child_id) = store.insert_child(&tom(parent_id)).await.unwrap()
    else {
        panic!("insert failed");
    };

    let first = store.upsert_attendance(&service_event(child_id)).await.unwrap();
    assert!(first.inserted);

    let second = store.upsert_attendance(&service_event(child_id)).await.unwrap();
    assert!(!second.inserted);
    assert_eq!(first.id, second.id);
    assert_eq!(store.attendance_count(), 1);

    let row = store.get_attendance(first.id).unwrap();
    assert!(row.was_present);
}

#[rstest]
#[tokio::test]
async fn earlier_check_in_time_is_not_clobbered(store: MemStore) {
    let InsertOutcome::Created(parent_id) = store.insert_parent(&jane()).await.unwrap() else {
        panic!("insert failed");
    };
    let InsertOutcome::Created(child_id) = store.insert_child(&tom(parent_id)).await.unwrap()
    else {
        panic!("insert failed");
    };

    let mut with_time = service_event(child_id);
    with_time.check_in_time = NaiveTime::from_hms_opt(8, 45, 0);
    let first = store.upsert_attendance(&with_time).await.unwrap();

    let mut later = service_event(child_id);
    later.check_in_time = NaiveTime::from_hms_opt(10, 30, 0);
    store.upsert_attendance(&later).await.unwrap();

    let row = store.get_attendance(first.id).unwrap();
    assert_eq!(row.check_in_time, NaiveTime::from_hms_opt(8, 45, 0));
}

#[rstest]
#[tokio::test]
async fn replay_cannot_merge_check_out_before_existing_check_in(store: MemStore) {
    let InsertOutcome::Created(parent_id) = store.insert_parent(&jane()).await.unwrap() else {
        panic!("insert failed");
    };
    let InsertOutcome::Created(child_id) = store.insert_child(&tom(parent_id)).await.unwrap()
    else {
        panic!("insert failed");
    };

    let mut first = service_event(child_id);
    first.check_in_time = NaiveTime::from_hms_opt(10, 0, 0);
    let recorded = store.upsert_attendance(&first).await.unwrap();

    // A replay carrying only an earlier check-out would merge into
    // check_in=10:00/check_out=09:00; both backends must reject that pair.
    let mut bad_replay = service_event(child_id);
    bad_replay.check_out_time = NaiveTime::from_hms_opt(9, 0, 0);
    let err = store.upsert_attendance(&bad_replay).await.unwrap_err();
    assert!(matches!(err, IngestError::IntegrityViolation(_)));

    // The stored row is untouched by the rejected replay.
    let row = store.get_attendance(recorded.id).unwrap();
    assert_eq!(row.check_in_time, NaiveTime::from_hms_opt(10, 0, 0));
    assert_eq!(row.check_out_time, None);

    // A consistent later check-out still merges in.
    let mut ok_replay = service_event(child_id);
    ok_replay.check_out_time = NaiveTime::from_hms_opt(12, 0, 0);
    store.upsert_attendance(&ok_replay).await.unwrap();
    let row = store.get_attendance(recorded.id).unwrap();
    assert_eq!(row.check_out_time, NaiveTime::from_hms_opt(12, 0, 0));
}

#[rstest]
#[tokio::test]
async fn check_out_before_check_in_is_rejected(store: MemStore) {
    let InsertOutcome::Created(parent_id) = store.insert_parent(&jane()).await.unwrap() else {
        panic!("insert failed");
    };
    let InsertOutcome::Created(child_id) = store.insert_child(&tom(parent_id)).await.unwrap()
    else {
        panic!("insert failed");
    };

    let mut event = service_event(child_id);
    event.check_in_time = NaiveTime::from_hms_opt(11, 0, 0);
    event.check_out_time = NaiveTime::from_hms_opt(9, 0, 0);

    let err = store.upsert_attendance(&event).await.unwrap_err();
    assert!(matches!(err, IngestError::IntegrityViolation(_)));
}

#[rstest]
#[tokio::test]
async fn resolver_reuses_winner_after_lost_race(store: MemStore) {
    // Simulate a concurrent run winning the insert between our (empty)
    // lookup and our own insert: the key already exists when the resolver
    // goes to create.
    let InsertOutcome::Created(winner) = store.insert_parent(&jane()).await.unwrap() else {
        panic!("insert failed");
    };

    let resolved = ParentResolver::resolve_or_create(&store, &jane()).await.unwrap();
    assert_eq!(resolved, Resolution::Existing(winner));
    assert_eq!(store.parent_count(), 1);
}

#[rstest]
#[tokio::test]
async fn child_resolver_derives_age_from_birthdate(store: MemStore) {
    let InsertOutcome::Created(parent_id) = store.insert_parent(&jane()).await.unwrap() else {
        panic!("insert failed");
    };

    let candidate = crate::models::child::ChildCandidate {
        full_name: "Tom Doe".into(),
        gender: Gender::Male,
        age: None,
        birth_date: NaiveDate::from_ymd_opt(2019, 6, 15),
        special_needs: None,
        allergies: None,
        relationship_to_parent: None,
    };
    let as_of = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();

    let resolved = ChildResolver::resolve_or_create(&store, parent_id, &candidate, as_of)
        .await
        .unwrap();
    let child = store.get_child(resolved.id()).unwrap();
    assert_eq!(child.age, 4);
    assert_eq!(child.age_bracket, "Kindergarten (3-5 years)");
    assert_eq!(child.relationship_to_parent, "Son");
}
