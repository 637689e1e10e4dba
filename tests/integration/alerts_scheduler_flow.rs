//! End-to-end scheduling against SQLite, the system clock and a real timer.

use fae_alerts::alert::{Alert, AlertType, FocusState};
use fae_alerts::storage::AlertStorage;
use fae_alerts::{AlertEvent, SqliteAlertStorage};

use crate::helpers::{now, start_scheduler, wait_for};

#[test]
fn timer_signals_ready_for_upcoming_alert() {
    let dir = tempfile::tempdir().unwrap();
    let (scheduler, events) = start_scheduler(&dir.path().join("alerts.db"));

    let alert = Alert::new("soon", AlertType::Timer, now() + 1).unwrap();
    scheduler.schedule_alert(alert).unwrap();
    wait_for(&events, "soon", AlertEvent::Ready);
    assert!(scheduler.active_alert().is_none());

    scheduler.shutdown();
}

#[test]
fn alarm_renders_and_is_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("alerts.db");
    let (scheduler, events) = start_scheduler(&db);

    let alert = Alert::new("wake", AlertType::Alarm, now())
        .unwrap()
        .with_label("wake up");
    scheduler.schedule_alert(alert).unwrap();
    wait_for(&events, "wake", AlertEvent::Ready);

    scheduler.update_focus(FocusState::Foreground);
    wait_for(&events, "wake", AlertEvent::Started);
    wait_for(&events, "wake", AlertEvent::FocusEnteredForeground);
    assert!(scheduler.is_alert_active("wake"));
    assert_eq!(scheduler.context_info().active_alerts.len(), 1);

    scheduler.delete_alert("wake").unwrap();
    let info = wait_for(&events, "wake", AlertEvent::Stopped);
    assert_eq!(info.reason, "AVS_STOP");
    assert!(scheduler.all_alerts().is_empty());
    scheduler.shutdown();

    let mut storage = SqliteAlertStorage::new(&db);
    storage.open().unwrap();
    assert!(storage.load().unwrap().is_empty());
}

#[test]
fn snoozed_alert_survives_in_storage() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("alerts.db");
    let (scheduler, events) = start_scheduler(&db);

    let start = now();
    scheduler
        .schedule_alert(Alert::new("nap", AlertType::Alarm, start).unwrap())
        .unwrap();
    scheduler.update_focus(FocusState::Background);
    wait_for(&events, "nap", AlertEvent::Started);

    scheduler.snooze_alert("nap", start + 540).unwrap();
    let info = wait_for(&events, "nap", AlertEvent::Snoozed);
    assert_eq!(info.alert.scheduled_time, start + 540);
    scheduler.shutdown();

    let mut storage = SqliteAlertStorage::new(&db);
    storage.open().unwrap();
    let stored = storage.load().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].scheduled_time, start + 540);
    assert_eq!(stored[0].label, None);
}
