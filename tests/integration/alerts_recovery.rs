//! Restart behaviour: persisted alerts are reconciled on initialize.

use fae_alerts::alert::{Alert, AlertState, AlertType, FocusState};
use fae_alerts::storage::AlertStorage;
use fae_alerts::{AlertEvent, SqliteAlertStorage};

use crate::helpers::{now, start_scheduler, stored_alarm, wait_for};

#[test]
fn interrupted_alert_is_rescheduled_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("alerts.db");

    let (first, events) = start_scheduler(&db);
    let due = now() + 600;
    first
        .schedule_alert(Alert::new("crash", AlertType::Alarm, due).unwrap())
        .unwrap();
    first.update_focus(FocusState::Foreground);
    wait_for(&events, "crash", AlertEvent::Started);
    first.shutdown();

    let mut storage = SqliteAlertStorage::new(&db);
    storage.open().unwrap();
    assert_eq!(storage.load().unwrap()[0].state, AlertState::Active);
    drop(storage);

    let (second, events) = start_scheduler(&db);
    wait_for(&events, "crash", AlertEvent::ScheduledForLater);
    let alerts = second.all_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].state, AlertState::Set);
    assert_eq!(alerts[0].scheduled_time, due);
    assert!(second.active_alert().is_none());
    second.shutdown();
}

#[test]
fn past_due_alert_is_reported_and_purged() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("alerts.db");

    let mut storage = SqliteAlertStorage::new(&db);
    storage.create_database().unwrap();
    storage
        .store(&stored_alarm("stale", now() - 3600, AlertState::Set))
        .unwrap();
    storage
        .store(&stored_alarm("fresh", now() + 3600, AlertState::Set))
        .unwrap();
    drop(storage);

    let (scheduler, events) = start_scheduler(&db);
    wait_for(&events, "stale", AlertEvent::PastDue);
    assert!(!scheduler.context_info().contains("stale"));
    assert!(scheduler.context_info().contains("fresh"));
    scheduler.shutdown();

    let mut storage = SqliteAlertStorage::new(&db);
    storage.open().unwrap();
    let tokens: Vec<String> = storage.load().unwrap().into_iter().map(|r| r.token).collect();
    assert_eq!(tokens, vec!["fresh".to_owned()]);
}

#[test]
fn unreadable_database_is_recreated() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("alerts.db");
    std::fs::write(&db, b"not a database").unwrap();

    let (scheduler, _events) = start_scheduler(&db);
    scheduler
        .schedule_alert(Alert::new("new", AlertType::Reminder, now() + 60).unwrap())
        .unwrap();
    assert_eq!(scheduler.all_alerts().len(), 1);
    scheduler.shutdown();
}

#[test]
fn offline_stops_persist_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("alerts.db");

    let (first, _events) = start_scheduler(&db);
    first.save_offline_stopped_alert("gone", now() - 10).unwrap();
    first.shutdown();

    let (second, _events) = start_scheduler(&db);
    let offline = second.offline_stopped_alerts().unwrap();
    assert_eq!(offline.len(), 1);
    assert_eq!(offline[0].token, "gone");
    second.delete_offline_stopped_alert("gone").unwrap();
    assert!(second.offline_stopped_alerts().unwrap().is_empty());
    second.shutdown();
}
