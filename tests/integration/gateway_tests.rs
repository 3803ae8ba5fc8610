//! End-to-end gateway tests: HTTP method, path and body through the
//! router, the AppService and back out as a rendered JSON reply.

use std::cell::Cell;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use serde_json::Value;

use crate::mock_hw::{LogSink, MockBoard, MockNvs, MockPwm};

use pilldispenser::adapters::board::Board;
use pilldispenser::adapters::hardware::{HardwareAdapter, PulseProfile};
use pilldispenser::app::commands::{AppCommand, AppResponse, CommandError};
use pilldispenser::app::events::AppEvent;
use pilldispenser::app::service::AppService;
use pilldispenser::config::DispenserConfig;
use pilldispenser::drivers::servo::ServoDriver;
use pilldispenser::error::{ActuatorFault, DispenseError};
use pilldispenser::gateway::channels::{self, CANCEL_DISPENSE, DISPENSE_ACTIVE, REPLIES, REQUESTS};
use pilldispenser::gateway::router::{busy_reply, cancel_reply, dispense_started};
use pilldispenser::gateway::{HttpReply, Method, Route, render, route};

struct Device {
    app: AppService,
    board: MockBoard,
    nvs: MockNvs,
    sink: LogSink,
}

impl Device {
    fn new() -> Self {
        let mut app = AppService::new();
        let mut board = MockBoard::at(10, 15);
        let nvs = MockNvs::new();
        let mut sink = LogSink::new();
        app.start(&nvs, &mut board, &mut sink);
        Self {
            app,
            board,
            nvs,
            sink,
        }
    }

    fn request(&mut self, method: Method, uri: &str, body: &str) -> HttpReply {
        match route(method, uri, body.as_bytes()) {
            Route::Command(cmd) => render(&self.app.handle_command(
                cmd,
                &mut self.board,
                &mut self.nvs,
                &mut self.sink,
            )),
            // Runs to completion here; on the device the loop picks it up
            // after the 202 has gone out.
            Route::Submit(cmd) => {
                self.app
                    .handle_command(cmd, &mut self.board, &mut self.nvs, &mut self.sink);
                dispense_started()
            }
            Route::Cancel => cancel_reply(false),
            Route::Reply(reply) => reply,
        }
    }
}

/// Servo delay that plays the HTTP task once, `after_ms` into a dispense:
/// it asks for a status (must be busy) and then posts a cancel.
/// Records `(status was busy, cancel accepted)`.
struct CancellingDelay {
    elapsed_ms: u64,
    after_ms: u64,
    answered: Rc<Cell<Option<(bool, bool)>>>,
}

impl DelayNs for CancellingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ms += u64::from(ns) / 1_000_000;
        if self.answered.get().is_none() && self.elapsed_ms >= self.after_ms {
            let busy = channels::call(AppCommand::GetStatus).is_none();
            self.answered.set(Some((busy, channels::request_cancel())));
        }
    }
}

fn json(reply: &HttpReply) -> Value {
    serde_json::from_str(&reply.body).unwrap()
}

#[test]
fn info_on_fresh_device() {
    let mut dev = Device::new();
    let reply = dev.request(Method::Get, "/info", "");
    assert_eq!(reply.status, 200);
    let doc = json(&reply);
    assert_eq!(doc["device_name"], "Medicine Dispenser");
    assert_eq!(doc["configured"], false);
    assert_eq!(doc["schedule_count"], 0);
    assert_eq!(doc["current_time"], "10:15:00");
    assert_eq!(doc["ap_ip"], "192.168.4.1");
    assert!(doc.get("next_dispense").is_none());
}

#[test]
fn schedule_round_trip_through_http() {
    let mut dev = Device::new();
    let reply = dev.request(
        Method::Post,
        "/configure_schedule",
        r#"{"schedule":[{"hour":8,"minute":0,"pills":2},{"hour":20,"minute":30,"pills":1,"active":false}]}"#,
    );
    assert_eq!(reply.status, 200);
    assert_eq!(json(&reply)["status"], "success");

    let doc = json(&dev.request(Method::Get, "/schedule", ""));
    let events = doc["schedule"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["pills"], 2);
    assert_eq!(events[1]["active"], false);
    assert_eq!(events[0]["dispensed_today"], false);

    let info = json(&dev.request(Method::Get, "/info", ""));
    assert_eq!(info["configured"], true);
    assert_eq!(info["next_dispense"], "08:00");
}

#[test]
fn invalid_schedule_is_400_and_changes_nothing() {
    let mut dev = Device::new();
    let reply = dev.request(
        Method::Post,
        "/configure_schedule",
        r#"{"schedule":[{"hour":8,"minute":75,"pills":1}]}"#,
    );
    assert_eq!(reply.status, 400);
    assert_eq!(json(&reply)["status"], "error");
    assert!(!dev.app.engine().schedule().is_configured());
}

#[test]
fn manual_dispense_over_http() {
    let mut dev = Device::new();
    let reply = dev.request(Method::Post, "/dispense", r#"{"pills":3}"#);
    assert_eq!(reply.status, 202);
    assert_eq!(json(&reply)["status"], "success");
    assert_eq!(dev.board.dispensed, vec![3]);

    let reply = dev.request(Method::Post, "/dispense", r#"{"pills":0}"#);
    assert_eq!(reply.status, 400);
    assert_eq!(dev.board.dispensed, vec![3]);
}

#[test]
fn actuator_failure_after_202_is_reported_as_event() {
    let mut dev = Device::new();
    dev.board.fail_after = Some(0);
    let reply = dev.request(Method::Post, "/dispense", r#"{"quantity":2}"#);
    assert_eq!(reply.status, 202);
    assert_eq!(dev.sink.count(|e| matches!(e, AppEvent::DispenseFailed { .. })), 1);
}

#[test]
fn wifi_configuration_over_http() {
    let mut dev = Device::new();
    let reply = dev.request(
        Method::Post,
        "/configure_wifi",
        r#"{"ssid":"Home","password":"password1","timezone_offset":2}"#,
    );
    assert_eq!(reply.status, 200);
    let info = json(&dev.request(Method::Get, "/info", ""));
    assert_eq!(info["wifi_connected"], true);
    assert_eq!(info["timezone_offset"], 2);

    let reply = dev.request(
        Method::Post,
        "/configure_wifi",
        r#"{"ssid":"Home","password":"password1","timezone_offset":99}"#,
    );
    assert_eq!(reply.status, 400);
}

#[test]
fn cancel_when_idle_is_409() {
    let mut dev = Device::new();
    assert_eq!(dev.request(Method::Post, "/cancel", "").status, 409);
}

/// The only test touching the global channels, so it cannot race.
#[test]
fn channel_bridge_serves_requests_and_cancels_submitted_dispense() {
    let server = std::thread::spawn(|| channels::call(AppCommand::GetStatus));

    let mut dev = Device::new();
    let request = loop {
        if let Ok(req) = REQUESTS.try_receive() {
            break req;
        }
        std::thread::yield_now();
    };
    let response = dev
        .app
        .handle_command(request.command, &mut dev.board, &mut dev.nvs, &mut dev.sink);
    assert!(REPLIES.try_send(response).is_ok());

    let answered = server.join().unwrap().expect("not busy");
    assert_eq!(render(&answered).status, 200);

    DISPENSE_ACTIVE.signal(());
    assert!(channels::call(AppCommand::GetStatus).is_none());
    assert!(channels::request_cancel());
    assert_eq!(busy_reply().status, 503);
    DISPENSE_ACTIVE.reset();
    CANCEL_DISPENSE.reset();
    assert!(!channels::request_cancel());

    // A manual dispense is queued without waiting, so the server can take
    // a cancel while the loop drives the gate.
    assert!(channels::submit(AppCommand::ManualDispense { quantity: 5 }));
    assert!(!channels::submit(AppCommand::ManualDispense { quantity: 1 }));

    let answered = Rc::new(Cell::new(None));
    let delay = CancellingDelay {
        elapsed_ms: 0,
        after_ms: 4000,
        answered: Rc::clone(&answered),
    };
    let profile = PulseProfile::from(&DispenserConfig::default());
    let gate = HardwareAdapter::new(
        ServoDriver::new(MockPwm::default()),
        delay,
        profile,
        &CANCEL_DISPENSE,
        &DISPENSE_ACTIVE,
    );
    let mut board = Board::new(MockBoard::at(10, 15), gate, MockBoard::at(10, 15));

    let request = REQUESTS.try_receive().expect("dispense queued");
    assert!(!request.awaits_reply);
    assert!(REQUESTS.try_receive().is_err());
    let response = dev
        .app
        .handle_command(request.command, &mut board, &mut dev.nvs, &mut dev.sink);

    assert_eq!(answered.get(), Some((true, true)));
    match &response {
        AppResponse::Rejected(CommandError::Dispense(DispenseError::Actuator(e))) => {
            assert_eq!(e.fault, ActuatorFault::Cancelled);
            assert_eq!(e.completed, 2);
        }
        other => panic!("expected cancelled dispense, got {other:?}"),
    }
    assert!(DISPENSE_ACTIVE.signaled(), "held until the loop completes it");

    channels::complete(request.awaits_reply, response);
    assert!(!DISPENSE_ACTIVE.signaled());
    assert!(!CANCEL_DISPENSE.signaled());
    assert!(REPLIES.try_receive().is_err(), "nobody waits for a submitted reply");
}
