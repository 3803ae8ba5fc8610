//! Restart scenarios: what one boot writes through the service, the next
//! boot must restore through the codec.

use crate::mock_hw::{LogSink, MockBoard, MockNvs};

use pilldispenser::app::commands::AppCommand;
use pilldispenser::app::events::AppEvent;
use pilldispenser::app::service::AppService;
use pilldispenser::error::{CodecError, EventFault, RecordFault};
use pilldispenser::persistence::{self, KEY_COUNT, KEY_CONFIGURED, NAMESPACE, RecordValue, event_key};
use pilldispenser::schedule::DispenseEvent;

fn ev(hour: u8, minute: u8, quantity: u16) -> DispenseEvent {
    DispenseEvent::new(hour, minute, quantity).unwrap()
}

fn boot(nvs: &MockNvs, board: &mut MockBoard) -> (AppService, LogSink) {
    let mut app = AppService::new();
    let mut sink = LogSink::new();
    app.start(nvs, board, &mut sink);
    (app, sink)
}

fn put(nvs: &mut MockNvs, key: &str, value: RecordValue) {
    let mut buf = [0u8; 32];
    let bytes = value.to_bytes(&mut buf).unwrap();
    nvs.put_raw(NAMESPACE, key, bytes);
}

#[test]
fn schedule_and_timezone_survive_restart() {
    let mut nvs = MockNvs::new();
    let mut board = MockBoard::at(8, 0);
    let (mut app, mut sink) = boot(&nvs, &mut board);

    app.handle_command(
        AppCommand::SetSchedule(vec![ev(8, 0, 2), ev(21, 45, 1)]),
        &mut board,
        &mut nvs,
        &mut sink,
    );
    app.handle_command(
        AppCommand::ConfigureNetwork {
            ssid: "Home".into(),
            password: "password1".into(),
            timezone_offset_hours: 9,
        },
        &mut board,
        &mut nvs,
        &mut sink,
    );
    app.tick(&mut board, &mut sink);
    assert!(app.engine().schedule().is_fired(0));

    let mut rebooted = MockBoard::new();
    let (app, sink) = boot(&nvs, &mut rebooted);
    let schedule = app.engine().schedule();
    assert!(schedule.is_configured());
    assert_eq!(schedule.len(), 2);
    assert_eq!(schedule.slots()[1].event, ev(21, 45, 1));
    assert_eq!(schedule.timezone_offset_hours(), 9);
    assert_eq!(rebooted.utc_offset_hours, 9);
    // Fired flags are runtime-only.
    assert!(!schedule.is_fired(0));
    assert!(sink.events.iter().all(|e| !matches!(e, AppEvent::RecordSkipped(_))));

    let creds = persistence::load_wifi_credentials(&nvs).unwrap();
    assert_eq!(creds.ssid.as_str(), "Home");
}

#[test]
fn shorter_schedule_does_not_resurrect_old_events() {
    let mut nvs = MockNvs::new();
    let mut board = MockBoard::new();
    let (mut app, mut sink) = boot(&nvs, &mut board);

    let long: Vec<_> = (0..5).map(|h| ev(h, 0, 1)).collect();
    app.handle_command(AppCommand::SetSchedule(long), &mut board, &mut nvs, &mut sink);
    app.handle_command(
        AppCommand::SetSchedule(vec![ev(12, 0, 1)]),
        &mut board,
        &mut nvs,
        &mut sink,
    );
    assert!(!nvs.exists_event(1));

    let (app, _) = boot(&nvs, &mut board);
    assert_eq!(app.engine().schedule().len(), 1);
}

#[test]
fn legacy_text_records_are_restored() {
    let mut nvs = MockNvs::new();
    put(&mut nvs, KEY_COUNT, RecordValue::Int(2));
    put(&mut nvs, KEY_CONFIGURED, RecordValue::Bool(true));
    nvs.put_raw(NAMESPACE, &event_key(0), b"7,30,2");
    nvs.put_raw(NAMESPACE, &event_key(1), b"19, 0, 1");

    let mut board = MockBoard::new();
    let (app, _) = boot(&nvs, &mut board);
    let events: Vec<_> = app.engine().schedule().events().copied().collect();
    assert_eq!(events, vec![ev(7, 30, 2), ev(19, 0, 1)]);
}

#[test]
fn corrupt_record_is_skipped_and_reported() {
    let mut nvs = MockNvs::new();
    put(&mut nvs, KEY_COUNT, RecordValue::Int(3));
    put(&mut nvs, KEY_CONFIGURED, RecordValue::Bool(true));
    put(
        &mut nvs,
        &event_key(0),
        RecordValue::Triple {
            hour: 6,
            minute: 0,
            quantity: 1,
        },
    );
    nvs.put_raw(NAMESPACE, &event_key(1), b"24,0,1");

    let mut board = MockBoard::new();
    let (app, sink) = boot(&nvs, &mut board);
    assert_eq!(app.engine().schedule().len(), 1);

    let skipped: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::RecordSkipped(err) => Some(*err),
            _ => None,
        })
        .collect();
    assert_eq!(
        skipped,
        vec![
            CodecError::CorruptRecord {
                index: 1,
                reason: RecordFault::Invalid(EventFault::HourOutOfRange),
            },
            CodecError::CorruptRecord {
                index: 2,
                reason: RecordFault::Missing,
            },
        ]
    );
}

#[test]
fn failed_join_does_not_store_credentials() {
    let mut nvs = MockNvs::new();
    let mut board = MockBoard::new();
    board.reachable = false;
    let (mut app, mut sink) = boot(&nvs, &mut board);

    app.handle_command(
        AppCommand::ConfigureNetwork {
            ssid: "Faraway".into(),
            password: "password1".into(),
            timezone_offset_hours: 1,
        },
        &mut board,
        &mut nvs,
        &mut sink,
    );
    assert!(persistence::load_wifi_credentials(&nvs).is_none());

    let (app, _) = boot(&nvs, &mut board);
    assert_eq!(app.engine().schedule().timezone_offset_hours(), 1);
}
