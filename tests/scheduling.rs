use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::{json, Value};
use shopshift::models::tables;
use shopshift::prelude::*;
use shopshift_client::StoreOperation;
use std::sync::Arc;
use uuid::Uuid;

fn scheduler_as(store: &MemoryStore, user: Uuid) -> Scheduler {
    Scheduler::from_parts(
        Arc::new(store.clone()),
        Arc::new(StaticIdentity::signed_in(AuthUser::new(user))),
    )
}

fn seed_shift(
    store: &MemoryStore,
    shop_id: Uuid,
    user_id: Option<Uuid>,
    start: DateTime<Utc>,
    hours: i64,
) -> Uuid {
    let id = Uuid::new_v4();
    store.seed(
        tables::SHIFTS,
        vec![json!({
            "id": id,
            "shop_id": shop_id,
            "user_id": user_id,
            "position_id": null,
            "start_time": start,
            "end_time": start + Duration::hours(hours),
            "break_minutes": 0,
            "status": "published",
            "is_open": user_id.is_none(),
        })],
    );
    id
}

fn shifts(store: &MemoryStore) -> Vec<Shift> {
    serde_json::from_value(Value::Array(store.rows(tables::SHIFTS))).unwrap()
}

fn shift(store: &MemoryStore, id: Uuid) -> Shift {
    shifts(store).into_iter().find(|s| s.id == id).unwrap()
}

fn status_of(store: &MemoryStore, table: &str, id: Uuid) -> String {
    store
        .rows(table)
        .into_iter()
        .find(|row| row["id"] == json!(id))
        .and_then(|row| row["status"].as_str().map(str::to_string))
        .unwrap()
}

#[tokio::test]
async fn week_copy_offsets_every_source_by_whole_weeks() {
    let store = MemoryStore::new();
    let shop_id = Uuid::new_v4();
    let ctx = ShopContext::new(shop_id, chrono_tz::UTC);
    let scheduler = scheduler_as(&store, Uuid::new_v4());

    // Week of Sunday 2024-03-03
    let sources = [
        seed_shift(&store, shop_id, None, Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(), 8),
        seed_shift(&store, shop_id, Some(Uuid::new_v4()), Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap(), 6),
        seed_shift(&store, shop_id, None, Utc.with_ymd_and_hms(2024, 3, 9, 22, 0, 0).unwrap(), 8),
    ];
    seed_shift(&store, shop_id, None, Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap(), 8);
    seed_shift(&store, Uuid::new_v4(), None, Utc.with_ymd_and_hms(2024, 3, 5, 9, 0, 0).unwrap(), 8);
    store.seed(
        tables::SHIFT_BREAKS,
        vec![json!({
            "id": Uuid::new_v4(),
            "shift_id": sources[0],
            "label": "Lunch",
            "duration_minutes": 30,
            "is_paid": false,
            "sort_order": 0,
        })],
    );

    let report = scheduler
        .shifts()
        .copy_week_forward(&ctx, NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(), 3)
        .await
        .unwrap();
    assert_eq!(report.created, 9);
    assert_eq!(report.source_shifts, 3);
    assert_eq!(report.breaks_copied, 3);

    let all = shifts(&store);
    let copies: Vec<&Shift> = all.iter().filter(|s| s.status == ShiftStatus::Draft).collect();
    assert_eq!(copies.len(), 9);
    for source_id in sources {
        let source = shift(&store, source_id);
        for week in 1..=3 {
            let delta = Duration::weeks(week);
            let copy = copies
                .iter()
                .find(|c| c.start_time == source.start_time + delta && c.user_id == source.user_id)
                .unwrap();
            assert_eq!(copy.end_time, source.end_time + delta);
            assert_eq!(copy.is_open, source.user_id.is_none());
        }
    }
}

#[tokio::test]
async fn approving_a_claim_denies_every_competitor() {
    let store = MemoryStore::new();
    let shop_id = Uuid::new_v4();
    let manager = Uuid::new_v4();
    let scheduler = scheduler_as(&store, manager);
    let shift_id = seed_shift(&store, shop_id, None, Utc::now() + Duration::days(2), 8);
    let other_shift = seed_shift(&store, shop_id, None, Utc::now() + Duration::days(3), 8);

    let claim = |shift: Uuid, user: Uuid| {
        let id = Uuid::new_v4();
        store.seed(
            tables::OPEN_SHIFT_CLAIMS,
            vec![json!({
                "id": id,
                "shop_id": shop_id,
                "shift_id": shift,
                "user_id": user,
                "status": "pending",
            })],
        );
        id
    };
    let winner = Uuid::new_v4();
    let a = claim(shift_id, winner);
    let b = claim(shift_id, Uuid::new_v4());
    let c = claim(shift_id, Uuid::new_v4());
    let elsewhere = claim(other_shift, Uuid::new_v4());

    scheduler.claims().approve_claim(a).await.unwrap();

    assert_eq!(status_of(&store, tables::OPEN_SHIFT_CLAIMS, a), "approved");
    assert_eq!(status_of(&store, tables::OPEN_SHIFT_CLAIMS, b), "denied");
    assert_eq!(status_of(&store, tables::OPEN_SHIFT_CLAIMS, c), "denied");
    assert_eq!(status_of(&store, tables::OPEN_SHIFT_CLAIMS, elsewhere), "pending");

    let assigned = shift(&store, shift_id);
    assert_eq!(assigned.user_id, Some(winner));
    assert!(!assigned.is_open);

    let err = scheduler.claims().approve_claim(b).await.unwrap_err();
    assert_eq!(err.to_string(), "Claim has already been reviewed");
}

#[tokio::test]
async fn bilateral_swap_exchanges_assignees_and_offer_does_not() {
    let store = MemoryStore::new();
    let shop_id = Uuid::new_v4();
    let scheduler = scheduler_as(&store, Uuid::new_v4());
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let start = Utc::now() + Duration::days(4);
    let alice_shift = seed_shift(&store, shop_id, Some(alice), start, 8);
    let bob_shift = seed_shift(&store, shop_id, Some(bob), start + Duration::days(1), 8);

    let swap = |target_shift: Option<Uuid>, target: Option<Uuid>| {
        let id = Uuid::new_v4();
        store.seed(
            tables::SWAP_REQUESTS,
            vec![json!({
                "id": id,
                "shop_id": shop_id,
                "requester_shift_id": alice_shift,
                "target_shift_id": target_shift,
                "requester_id": alice,
                "target_id": target,
                "status": "pending",
            })],
        );
        id
    };

    let offer = swap(None, None);
    scheduler.swaps().approve_swap(offer).await.unwrap();
    assert_eq!(status_of(&store, tables::SWAP_REQUESTS, offer), "approved");
    assert_eq!(shift(&store, alice_shift).user_id, Some(alice));
    assert_eq!(shift(&store, bob_shift).user_id, Some(bob));

    let exchange = swap(Some(bob_shift), Some(bob));
    scheduler.swaps().approve_swap(exchange).await.unwrap();
    assert_eq!(shift(&store, alice_shift).user_id, Some(bob));
    assert_eq!(shift(&store, bob_shift).user_id, Some(alice));
    assert!(!shift(&store, alice_shift).is_open);
}

#[tokio::test]
async fn failed_swap_reassignment_restores_everything() {
    let store = MemoryStore::new();
    let shop_id = Uuid::new_v4();
    let scheduler = scheduler_as(&store, Uuid::new_v4());
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let alice_shift = seed_shift(&store, shop_id, Some(alice), Utc::now() + Duration::days(1), 8);
    let bob_shift = seed_shift(&store, shop_id, Some(bob), Utc::now() + Duration::days(2), 8);
    let id = Uuid::new_v4();
    store.seed(
        tables::SWAP_REQUESTS,
        vec![json!({
            "id": id,
            "shop_id": shop_id,
            "requester_shift_id": alice_shift,
            "target_shift_id": bob_shift,
            "requester_id": alice,
            "target_id": bob,
            "status": "pending",
        })],
    );
    store.fail_next(tables::SHIFTS, StoreOperation::Update, "deadlock detected");

    let err = scheduler.swaps().approve_swap(id).await.unwrap_err();
    match err {
        Error::Aborted {
            step, rolled_back, ..
        } => {
            assert_eq!(step, "reassign_requester_shift");
            assert!(rolled_back);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(status_of(&store, tables::SWAP_REQUESTS, id), "pending");
    assert_eq!(shift(&store, alice_shift).user_id, Some(alice));
    assert_eq!(shift(&store, bob_shift).user_id, Some(bob));
}

#[tokio::test]
async fn archiving_removes_future_work_only() {
    let store = MemoryStore::new();
    let shop_id = Uuid::new_v4();
    let scheduler = scheduler_as(&store, Uuid::new_v4());
    let member_user = Uuid::new_v4();
    let member_id = Uuid::new_v4();
    store.seed(
        tables::SHOP_MEMBERS,
        vec![json!({
            "id": member_id,
            "shop_id": shop_id,
            "user_id": member_user,
            "role": "technician",
            "is_active": true,
        })],
    );
    let past = seed_shift(&store, shop_id, Some(member_user), Utc::now() - Duration::days(3), 8);
    let future = seed_shift(&store, shop_id, Some(member_user), Utc::now() + Duration::days(3), 8);
    let other_shop_future =
        seed_shift(&store, Uuid::new_v4(), Some(member_user), Utc::now() + Duration::days(3), 8);
    let swap_id = Uuid::new_v4();
    store.seed(
        tables::SWAP_REQUESTS,
        vec![json!({
            "id": swap_id,
            "shop_id": shop_id,
            "requester_shift_id": future,
            "requester_id": member_user,
            "status": "pending",
        })],
    );

    let report = scheduler.members().archive_member(member_id).await.unwrap();
    assert_eq!(report.deleted_shifts, 1);
    assert_eq!(report.cancelled_swaps, 1);

    let remaining: Vec<Uuid> = shifts(&store).iter().map(|s| s.id).collect();
    assert!(remaining.contains(&past));
    assert!(!remaining.contains(&future));
    assert!(remaining.contains(&other_shop_future));
    assert_eq!(status_of(&store, tables::SWAP_REQUESTS, swap_id), "cancelled");

    let member = scheduler.members().get_member(member_id).await.unwrap();
    assert!(!member.is_active);
}

#[tokio::test]
async fn bulk_patch_distinguishes_absent_null_and_value() {
    let store = MemoryStore::new();
    let shop_id = Uuid::new_v4();
    let ctx = ShopContext::new(shop_id, chrono_tz::UTC);
    let scheduler = scheduler_as(&store, Uuid::new_v4());
    let position = Uuid::new_v4();
    let start = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
    let ids: Vec<Uuid> = (0..2)
        .map(|day| seed_shift(&store, shop_id, None, start + Duration::days(day), 8))
        .collect();
    let positions = |store: &MemoryStore| -> Vec<Option<Uuid>> {
        ids.iter().map(|id| shift(store, *id).position_id).collect()
    };

    let set: BulkShiftPatch =
        serde_json::from_value(json!({ "position_id": position })).unwrap();
    scheduler.shifts().bulk_update_shifts(&ctx, &ids, &set).await.unwrap();
    assert_eq!(positions(&store), vec![Some(position); 2]);

    let untouched: BulkShiftPatch = serde_json::from_value(json!({ "color": "#ff8800" })).unwrap();
    scheduler
        .shifts()
        .bulk_update_shifts(&ctx, &ids, &untouched)
        .await
        .unwrap();
    assert_eq!(positions(&store), vec![Some(position); 2]);
    assert!(ids
        .iter()
        .all(|id| shift(&store, *id).color.as_deref() == Some("#ff8800")));

    let clear: BulkShiftPatch = serde_json::from_value(json!({ "position_id": null })).unwrap();
    scheduler.shifts().bulk_update_shifts(&ctx, &ids, &clear).await.unwrap();
    assert_eq!(positions(&store), vec![None; 2]);
}

#[tokio::test]
async fn recurring_shift_copies_breaks_onto_every_instance() {
    let store = MemoryStore::new();
    let shop_id = Uuid::new_v4();
    let ctx = ShopContext::new(shop_id, chrono_tz::UTC);
    let scheduler = scheduler_as(&store, Uuid::new_v4());

    // Monday anchor, repeating Mondays and Wednesdays through the end of January
    let start = Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap();
    let mut request = CreateShiftRequest::new(start, start + Duration::hours(8));
    request.breaks = vec![
        BreakInput::new("Lunch", 30, false),
        BreakInput::new("Rest", 10, true),
    ];
    request.recurrence =
        Some(RecurrencePattern::weekly(&[1, 3]).until(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()));

    let created = scheduler.shifts().create_shift(&ctx, request).await.unwrap();
    // Mondays 15, 22, 29 and Wednesdays 10, 17, 24, 31
    assert_eq!(created.recurring_count, 7);
    assert_eq!(created.shift.break_minutes, 40);

    let all = shifts(&store);
    assert_eq!(all.len(), 8);
    assert!(all
        .iter()
        .all(|s| s.recurrence_group_id == created.shift.recurrence_group_id));
    assert!(all.iter().all(|s| s.duration() == Duration::hours(8)));
    assert_eq!(store.rows(tables::SHIFT_BREAKS).len(), 16);
}

#[tokio::test]
async fn failed_child_insert_removes_the_new_shift() {
    let store = MemoryStore::new();
    let ctx = ShopContext::new(Uuid::new_v4(), chrono_tz::UTC);
    let scheduler = scheduler_as(&store, Uuid::new_v4());
    store.fail_next(
        tables::SHIFT_TAG_ASSIGNMENTS,
        StoreOperation::Insert,
        "insert or update on table \"shift_tag_assignments\" violates foreign key constraint",
    );

    let start = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();
    let mut request = CreateShiftRequest::new(start, start + Duration::hours(4));
    request.breaks = vec![BreakInput::new("Break", 15, true)];
    request.tag_ids = vec![Uuid::new_v4()];

    let err = scheduler.shifts().create_shift(&ctx, request).await.unwrap_err();
    match &err {
        Error::Aborted {
            step, rolled_back, ..
        } => {
            assert_eq!(*step, "insert_tags");
            assert!(*rolled_back);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("violates foreign key constraint"));
    assert!(store.rows(tables::SHIFTS).is_empty());
    assert!(store.rows(tables::SHIFT_BREAKS).is_empty());
}

#[tokio::test]
async fn update_replaces_breaks_wholesale() {
    let store = MemoryStore::new();
    let shop_id = Uuid::new_v4();
    let scheduler = scheduler_as(&store, Uuid::new_v4());
    let id = seed_shift(&store, shop_id, None, Utc.with_ymd_and_hms(2024, 4, 2, 8, 0, 0).unwrap(), 9);
    store.seed(
        tables::SHIFT_BREAKS,
        (0..3)
            .map(|i| {
                json!({
                    "id": Uuid::new_v4(),
                    "shift_id": id,
                    "label": format!("Old {i}"),
                    "duration_minutes": 10,
                    "sort_order": i,
                })
            })
            .collect(),
    );

    let update = ShiftUpdate {
        breaks: Some(vec![BreakInput::new("Lunch", 45, false)]),
        ..Default::default()
    };
    let updated = scheduler.shifts().update_shift(id, update).await.unwrap();
    assert_eq!(updated.break_minutes, 45);

    let breaks = store.rows(tables::SHIFT_BREAKS);
    assert_eq!(breaks.len(), 1);
    assert_eq!(breaks[0]["label"], "Lunch");

    let cleared = ShiftUpdate {
        breaks: Some(Vec::new()),
        ..Default::default()
    };
    let updated = scheduler.shifts().update_shift(id, cleared).await.unwrap();
    assert_eq!(updated.break_minutes, 0);
    assert!(store.rows(tables::SHIFT_BREAKS).is_empty());
}

#[tokio::test]
async fn anonymous_callers_cannot_mutate() {
    let store = MemoryStore::new();
    let scheduler = Scheduler::from_parts(
        Arc::new(store.clone()),
        Arc::new(StaticIdentity::anonymous()),
    );
    let ctx = ShopContext::new(Uuid::new_v4(), chrono_tz::UTC);
    let start = Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap();

    let err = scheduler
        .shifts()
        .create_shift(&ctx, CreateShiftRequest::new(start, start + Duration::hours(4)))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Unauthorized");

    let err = scheduler
        .shifts()
        .copy_week_forward(&ctx, start.date_naive(), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized));
    assert!(store.rows(tables::SHIFTS).is_empty());
}
