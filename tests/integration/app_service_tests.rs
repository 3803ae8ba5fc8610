//! Integration tests for the AppService → DispenseEngine → actuator
//! pipeline.
//!
//! These run on the host (x86_64) and drive the full chain from an
//! incoming gateway command or control tick down to the dispenser port.

use crate::mock_hw::{LogSink, MockBoard, MockNvs};

use pilldispenser::app::commands::{AppCommand, AppResponse, CommandError};
use pilldispenser::app::events::{AppEvent, DispenseSource};
use pilldispenser::app::ports::ConnectivityError;
use pilldispenser::app::service::AppService;
use pilldispenser::clock::TimeOfDay;
use pilldispenser::error::{DispenseError, EventFault, ScheduleError};
use pilldispenser::schedule::DispenseEvent;
use pilldispenser::scheduler::TickOutcome;

fn ev(hour: u8, minute: u8, quantity: u16) -> DispenseEvent {
    DispenseEvent::new(hour, minute, quantity).unwrap()
}

fn make_app() -> (AppService, MockBoard, MockNvs, LogSink) {
    let mut app = AppService::new();
    let mut board = MockBoard::new();
    let nvs = MockNvs::new();
    let mut sink = LogSink::new();
    app.start(&nvs, &mut board, &mut sink);
    (app, board, nvs, sink)
}

fn install(
    app: &mut AppService,
    board: &mut MockBoard,
    nvs: &mut MockNvs,
    sink: &mut LogSink,
    events: &[DispenseEvent],
) {
    let resp = app.handle_command(AppCommand::SetSchedule(events.to_vec()), board, nvs, sink);
    assert_eq!(
        resp,
        AppResponse::ScheduleApplied {
            installed: events.len().min(10)
        }
    );
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn fresh_device_starts_unconfigured() {
    let (app, _board, _nvs, sink) = make_app();
    assert!(!app.engine().schedule().is_configured());
    assert!(app.engine().schedule().is_empty());
    assert!(matches!(
        sink.events.last(),
        Some(AppEvent::Started {
            events: 0,
            configured: false,
            ..
        })
    ));
}

// ── Scheduled dispensing ─────────────────────────────────────

#[test]
fn event_fires_once_per_day() {
    let (mut app, mut board, mut nvs, mut sink) = make_app();
    install(&mut app, &mut board, &mut nvs, &mut sink, &[ev(8, 0, 2)]);

    board.set_time(7, 59);
    app.tick(&mut board, &mut sink);
    assert!(board.dispensed.is_empty());

    // The loop samples many times within the same minute.
    board.set_time(8, 0);
    for _ in 0..20 {
        app.tick(&mut board, &mut sink);
    }
    assert_eq!(board.dispensed, vec![2]);
    assert!(app.engine().schedule().is_fired(0));

    board.set_time(8, 1);
    app.tick(&mut board, &mut sink);
    assert_eq!(board.dispensed, vec![2]);
}

#[test]
fn midnight_rollover_rearms_events() {
    let (mut app, mut board, mut nvs, mut sink) = make_app();
    install(&mut app, &mut board, &mut nvs, &mut sink, &[ev(8, 0, 1)]);

    board.set_time(8, 0);
    app.tick(&mut board, &mut sink);

    board.set_time(23, 59);
    app.tick(&mut board, &mut sink);
    board.set_time(0, 0);
    app.tick(&mut board, &mut sink);
    assert!(!app.engine().schedule().is_fired(0));
    assert_eq!(sink.count(|e| matches!(e, AppEvent::DayRolledOver(_))), 1);

    board.set_time(8, 0);
    app.tick(&mut board, &mut sink);
    assert_eq!(board.dispensed, vec![1, 1]);
}

#[test]
fn event_at_midnight_fires_exactly_once() {
    let (mut app, mut board, mut nvs, mut sink) = make_app();
    install(&mut app, &mut board, &mut nvs, &mut sink, &[ev(0, 0, 1)]);

    board.set_time(23, 59);
    app.tick(&mut board, &mut sink);
    board.set_time(0, 0);
    for _ in 0..10 {
        app.tick(&mut board, &mut sink);
    }
    assert_eq!(board.dispensed, vec![1]);
}

#[test]
fn disconnected_clock_suspends_dispensing() {
    let (mut app, mut board, mut nvs, mut sink) = make_app();
    install(&mut app, &mut board, &mut nvs, &mut sink, &[ev(9, 30, 1)]);

    board.disconnect_clock();
    assert_eq!(app.tick(&mut board, &mut sink), TickOutcome::SourceUnavailable);
    assert!(board.dispensed.is_empty());
    assert!(sink.events.contains(&AppEvent::ClockSource(false)));

    board.set_time(9, 30);
    app.tick(&mut board, &mut sink);
    assert_eq!(board.dispensed, vec![1]);
    assert!(sink.events.contains(&AppEvent::ClockSource(true)));
}

#[test]
fn simultaneous_events_fire_in_slot_order() {
    let (mut app, mut board, mut nvs, mut sink) = make_app();
    install(
        &mut app,
        &mut board,
        &mut nvs,
        &mut sink,
        &[ev(12, 0, 3), ev(6, 0, 9), ev(12, 0, 1)],
    );

    board.set_time(12, 0);
    app.tick(&mut board, &mut sink);
    assert_eq!(board.dispensed, vec![3, 1]);
}

#[test]
fn inactive_event_never_fires() {
    let (mut app, mut board, mut nvs, mut sink) = make_app();
    install(
        &mut app,
        &mut board,
        &mut nvs,
        &mut sink,
        &[ev(10, 0, 1).inactive()],
    );

    board.set_time(10, 0);
    app.tick(&mut board, &mut sink);
    assert!(board.dispensed.is_empty());
}

#[test]
fn failed_scheduled_dispense_is_not_retried() {
    let (mut app, mut board, mut nvs, mut sink) = make_app();
    install(&mut app, &mut board, &mut nvs, &mut sink, &[ev(14, 0, 3)]);
    board.fail_after = Some(1);

    board.set_time(14, 0);
    app.tick(&mut board, &mut sink);
    app.tick(&mut board, &mut sink);

    assert_eq!(board.dispensed, vec![3]);
    assert!(app.engine().schedule().is_fired(0));
    assert_eq!(
        sink.count(|e| matches!(
            e,
            AppEvent::DispenseFailed {
                source: DispenseSource::Scheduled { index: 0, .. },
                ..
            }
        )),
        1
    );
}

// ── Manual dispensing ────────────────────────────────────────

#[test]
fn manual_dispense_ignores_schedule_flags() {
    let (mut app, mut board, mut nvs, mut sink) = make_app();
    install(&mut app, &mut board, &mut nvs, &mut sink, &[ev(8, 0, 1)]);
    board.set_time(7, 0);

    let resp = app.handle_command(
        AppCommand::ManualDispense { quantity: 4 },
        &mut board,
        &mut nvs,
        &mut sink,
    );
    assert_eq!(resp, AppResponse::Dispensed { quantity: 4 });
    assert!(!app.engine().schedule().is_fired(0));

    board.set_time(8, 0);
    app.tick(&mut board, &mut sink);
    assert_eq!(board.dispensed, vec![4, 1]);
}

#[test]
fn manual_dispense_of_zero_is_rejected() {
    let (mut app, mut board, mut nvs, mut sink) = make_app();
    let resp = app.handle_command(
        AppCommand::ManualDispense { quantity: 0 },
        &mut board,
        &mut nvs,
        &mut sink,
    );
    assert_eq!(
        resp,
        AppResponse::Rejected(CommandError::Dispense(DispenseError::InvalidQuantity))
    );
    assert!(board.dispensed.is_empty());
}

// ── Schedule replacement ─────────────────────────────────────

#[test]
fn rejected_schedule_leaves_previous_one() {
    let (mut app, mut board, mut nvs, mut sink) = make_app();
    install(&mut app, &mut board, &mut nvs, &mut sink, &[ev(8, 0, 1)]);

    let bad = DispenseEvent {
        hour: 25,
        minute: 0,
        quantity: 1,
        active: true,
    };
    let resp = app.handle_command(
        AppCommand::SetSchedule(vec![ev(9, 0, 1), bad]),
        &mut board,
        &mut nvs,
        &mut sink,
    );
    assert_eq!(
        resp,
        AppResponse::Rejected(CommandError::Schedule(ScheduleError::InvalidEvent {
            index: 1,
            fault: EventFault::HourOutOfRange,
        }))
    );
    assert_eq!(app.engine().schedule().len(), 1);
    assert_eq!(app.engine().schedule().slots()[0].event.hour, 8);
}

#[test]
fn oversized_schedule_is_truncated() {
    let (mut app, mut board, mut nvs, mut sink) = make_app();
    let events: Vec<_> = (0..12).map(|h| ev(h, 0, 1)).collect();
    install(&mut app, &mut board, &mut nvs, &mut sink, &events);

    assert_eq!(app.engine().schedule().len(), 10);
    assert!(sink.events.contains(&AppEvent::ScheduleReplaced {
        installed: 10,
        submitted: 12,
    }));
}

#[test]
fn replacement_clears_fired_flags() {
    let (mut app, mut board, mut nvs, mut sink) = make_app();
    install(&mut app, &mut board, &mut nvs, &mut sink, &[ev(8, 0, 1)]);
    board.set_time(8, 0);
    app.tick(&mut board, &mut sink);

    install(&mut app, &mut board, &mut nvs, &mut sink, &[ev(8, 0, 2)]);
    assert!(!app.engine().schedule().is_fired(0));
    app.tick(&mut board, &mut sink);
    assert_eq!(board.dispensed, vec![1, 2]);
}

// ── Network and timezone ─────────────────────────────────────

#[test]
fn configure_network_applies_timezone_and_joins() {
    let (mut app, mut board, mut nvs, mut sink) = make_app();
    let resp = app.handle_command(
        AppCommand::ConfigureNetwork {
            ssid: "Home".into(),
            password: "password1".into(),
            timezone_offset_hours: -5,
        },
        &mut board,
        &mut nvs,
        &mut sink,
    );
    assert_eq!(resp, AppResponse::NetworkConfigured);
    assert_eq!(board.utc_offset_hours, -5);
    assert_eq!(app.engine().schedule().timezone_offset_hours(), -5);
    assert!(sink.events.contains(&AppEvent::TimezoneChanged(-5)));
    assert!(sink.events.contains(&AppEvent::NetworkJoined));
}

#[test]
fn invalid_timezone_is_rejected_before_joining() {
    let (mut app, mut board, mut nvs, mut sink) = make_app();
    let resp = app.handle_command(
        AppCommand::ConfigureNetwork {
            ssid: "Home".into(),
            password: "password1".into(),
            timezone_offset_hours: 15,
        },
        &mut board,
        &mut nvs,
        &mut sink,
    );
    assert_eq!(
        resp,
        AppResponse::Rejected(CommandError::Schedule(ScheduleError::InvalidTimezone))
    );
    assert!(board.joined.is_none());
}

#[test]
fn unreachable_network_keeps_timezone() {
    let (mut app, mut board, mut nvs, mut sink) = make_app();
    board.reachable = false;
    let resp = app.handle_command(
        AppCommand::ConfigureNetwork {
            ssid: "Faraway".into(),
            password: "password1".into(),
            timezone_offset_hours: 3,
        },
        &mut board,
        &mut nvs,
        &mut sink,
    );
    assert_eq!(
        resp,
        AppResponse::Rejected(CommandError::Connectivity(
            ConnectivityError::ConnectionFailed
        ))
    );
    assert_eq!(app.engine().schedule().timezone_offset_hours(), 3);
}

// ── Status and persistence failures ──────────────────────────

#[test]
fn status_reports_next_dispense() {
    let (mut app, mut board, mut nvs, mut sink) = make_app();
    install(
        &mut app,
        &mut board,
        &mut nvs,
        &mut sink,
        &[ev(20, 0, 1), ev(8, 0, 1)],
    );

    board.set_time(12, 0);
    let AppResponse::Status(status) =
        app.handle_command(AppCommand::GetStatus, &mut board, &mut nvs, &mut sink)
    else {
        panic!("expected status");
    };
    assert!(status.configured);
    assert_eq!(status.schedule_count, 2);
    assert_eq!(status.current_time.as_str(), "12:00:00");
    assert_eq!(status.next_dispense, TimeOfDay::new(20, 0));

    board.set_time(21, 0);
    assert_eq!(app.status(&board).next_dispense, TimeOfDay::new(8, 0));
}

#[test]
fn storage_failure_keeps_change_in_memory() {
    let (mut app, mut board, mut nvs, mut sink) = make_app();
    nvs.read_only = true;
    install(&mut app, &mut board, &mut nvs, &mut sink, &[ev(8, 0, 1)]);

    assert_eq!(app.engine().schedule().len(), 1);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::PersistFailed(_))),
        1
    );
}
