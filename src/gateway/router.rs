//! Request routing and reply rendering.
//!
//! Pure functions over method, path and body bytes, so the same code
//! serves the ESP-IDF HTTP server and host tests.
//!
//! | Method  | Path                  | Result                         |
//! |---------|-----------------------|--------------------------------|
//! | GET     | `/info`               | [`AppCommand::GetStatus`]      |
//! | POST    | `/configure_wifi`     | [`AppCommand::ConfigureNetwork`] |
//! | POST    | `/configure_schedule` | [`AppCommand::SetSchedule`]    |
//! | GET     | `/schedule`           | [`AppCommand::GetSchedule`]    |
//! | POST    | `/dispense`           | [`Route::Submit`]              |
//! | POST    | `/cancel`             | [`Route::Cancel`]              |
//! | OPTIONS | any                   | empty 200 (CORS preflight)     |
//!
//! A manual dispense is answered with 202 as soon as it is queued; the
//! server must stay free to take `POST /cancel` while the gate runs.

use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::commands::{AppCommand, AppResponse, CommandError};
use crate::app::ports::ConnectivityError;
use crate::error::{DispenseError, ScheduleError};
use crate::schedule::DispenseEvent;

use super::messages::{
    DispenseRequest, InfoReply, ScheduleReply, ScheduleRequest, StatusReply, WifiRequest,
    WireEvent,
};

/// Sent with every reply.
pub const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET,POST,OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type"),
];

const JSON: &str = "application/json";
const TEXT: &str = "text/plain";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Options,
    Other,
}

impl Method {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "OPTIONS" => Self::Options,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpReply {
    fn json<T: Serialize>(status: u16, doc: &T) -> Self {
        match serde_json::to_string(doc) {
            Ok(body) => Self {
                status,
                content_type: JSON,
                body,
            },
            Err(e) => {
                warn!("Gateway: reply serialisation failed: {}", e);
                Self::error(500, "Internal error")
            }
        }
    }

    pub fn success(message: &str) -> Self {
        Self::json(200, &StatusReply::success(message))
    }

    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::to_string(&StatusReply::error(message)).unwrap_or_default();
        Self {
            status,
            content_type: JSON,
            body,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            content_type: TEXT,
            body: "Not found".into(),
        }
    }

    pub fn preflight() -> Self {
        Self {
            status: 200,
            content_type: TEXT,
            body: String::new(),
        }
    }

    /// Content type followed by the CORS headers.
    pub fn headers(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        core::iter::once(("Content-Type", self.content_type)).chain(CORS_HEADERS)
    }
}

/// What the HTTP task should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Forward to the control loop and render its response.
    Command(AppCommand),
    /// Queue for the control loop and answer with [`dispense_started`].
    Submit(AppCommand),
    /// Raise the cancel signal for a running dispense.
    Cancel,
    /// Answer directly.
    Reply(HttpReply),
}

/// Map one request onto a [`Route`].  Query strings are ignored.
pub fn route(method: Method, uri: &str, body: &[u8]) -> Route {
    let path = uri.split('?').next().unwrap_or(uri);

    match (method, path) {
        (Method::Options, _) => Route::Reply(HttpReply::preflight()),
        (Method::Get, "/info") => Route::Command(AppCommand::GetStatus),
        (Method::Get, "/schedule") => Route::Command(AppCommand::GetSchedule),
        (Method::Post, "/cancel") => Route::Cancel,
        (Method::Post, "/configure_wifi") => {
            parse::<WifiRequest>(body).map_or_else(Route::Reply, |req| {
                Route::Command(AppCommand::ConfigureNetwork {
                    ssid: req.ssid,
                    password: req.password,
                    // Anything past i32 is out of range anyway.
                    timezone_offset_hours: i32::try_from(req.timezone_offset)
                        .unwrap_or(i32::MAX),
                })
            })
        }
        (Method::Post, "/configure_schedule") => {
            parse::<ScheduleRequest>(body).map_or_else(Route::Reply, |req| {
                match to_events(&req.schedule) {
                    Ok(events) => Route::Command(AppCommand::SetSchedule(events)),
                    Err(e) => Route::Reply(HttpReply::error(400, &e.to_string())),
                }
            })
        }
        (Method::Post, "/dispense") => {
            parse::<DispenseRequest>(body).map_or_else(Route::Reply, |req| {
                match u16::try_from(req.pills) {
                    Ok(quantity) if quantity > 0 => {
                        Route::Submit(AppCommand::ManualDispense { quantity })
                    }
                    _ => Route::Reply(HttpReply::error(
                        400,
                        &DispenseError::InvalidQuantity.to_string(),
                    )),
                }
            })
        }
        _ => Route::Reply(HttpReply::not_found()),
    }
}

/// Render the control loop's answer.
pub fn render(response: &AppResponse) -> HttpReply {
    match response {
        AppResponse::Status(status) => HttpReply::json(200, &InfoReply::from(status)),
        AppResponse::NetworkConfigured => HttpReply::success("WiFi connected"),
        AppResponse::ScheduleApplied { installed } => {
            HttpReply::success(&format!("Schedule configured ({installed} events)"))
        }
        AppResponse::Schedule(schedule) => HttpReply::json(200, &ScheduleReply::from(schedule)),
        AppResponse::Dispensed { .. } => HttpReply::success("Pills dispensed"),
        AppResponse::Rejected(CommandError::Connectivity(ConnectivityError::ConnectionFailed)) => {
            HttpReply::error(400, "Failed to connect to WiFi")
        }
        AppResponse::Rejected(e)
            if matches!(e, CommandError::Dispense(DispenseError::Actuator(_))) =>
        {
            HttpReply::error(500, &e.to_string())
        }
        AppResponse::Rejected(e) => HttpReply::error(400, &e.to_string()),
    }
}

/// Reply for [`Route::Cancel`].
pub fn cancel_reply(signalled: bool) -> HttpReply {
    if signalled {
        HttpReply::success("Cancel requested")
    } else {
        HttpReply::error(409, "No dispense in progress")
    }
}

/// Reply once a manual dispense is queued.  Its outcome goes to the log.
pub fn dispense_started() -> HttpReply {
    HttpReply::json(202, &StatusReply::success("Dispense started"))
}

/// Reply while the control loop is busy dispensing.
pub fn busy_reply() -> HttpReply {
    HttpReply::error(503, "Dispense in progress")
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, HttpReply> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(HttpReply::error(400, "No data received"));
    }
    serde_json::from_slice(body).map_err(|e| {
        warn!("Gateway: bad request body: {}", e);
        HttpReply::error(400, "Invalid JSON")
    })
}

/// Validate every submitted event, including those past capacity.
fn to_events(wire: &[WireEvent]) -> Result<Vec<DispenseEvent>, ScheduleError> {
    wire.iter()
        .enumerate()
        .map(|(index, w)| {
            let event = DispenseEvent::from_wide(w.hour, w.minute, w.pills)
                .map_err(|fault| ScheduleError::InvalidEvent { index, fault })?;
            Ok(if w.active { event } else { event.inactive() })
        })
        .collect()
}
