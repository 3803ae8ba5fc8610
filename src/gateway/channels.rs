//! Inter-task channels between the HTTP server and the control loop.
//!
//! Uses `embassy-sync` bounded channels so the server's handler threads
//! can hand work to the single-threaded control loop without sharing the
//! engine.  The loop drains [`REQUESTS`] once per tick.
//!
//! ```text
//! ┌──────────────┐ GatewayRequest ┌──────────────┐
//! │ HTTP handler │──────────────▶│ Control Loop │
//! │ (blocking)   │◀──────────────│ (sync)       │
//! └──────────────┘  AppResponse   └──────────────┘
//!         │            CANCEL_DISPENSE     ▲
//!         └─────────────────────────────────┘
//! ```
//!
//! The server handles one request at a time, so a single reply slot is
//! enough: every request that waits is answered before the next one is
//! read.  A manual dispense does not wait: [`submit`] raises
//! [`DISPENSE_ACTIVE`] and returns at once, leaving the server free to
//! read `POST /cancel` while the loop drives the gate.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{info, warn};

use crate::app::commands::{AppCommand, AppResponse};

/// Channel depth for inbound requests.
const REQUEST_DEPTH: usize = 4;

/// A command on its way to the control loop.
pub struct GatewayRequest {
    pub command: AppCommand,
    /// `false` for a [`submit`]ted command: nobody reads its reply.
    pub awaits_reply: bool,
}

/// Inbound request channel: HTTP handler → control loop.
pub static REQUESTS: Channel<CriticalSectionRawMutex, GatewayRequest, REQUEST_DEPTH> =
    Channel::new();

/// Outbound reply channel: control loop → HTTP handler.
pub static REPLIES: Channel<CriticalSectionRawMutex, AppResponse, 1> = Channel::new();

/// Raised by `POST /cancel`; observed by the actuator between units.
pub static CANCEL_DISPENSE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Set while a dispense is queued or running.
pub static DISPENSE_ACTIVE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Send one command and block the calling thread until it is answered.
///
/// Returns `None` without queueing while a dispense holds the control
/// loop, so the server stays free to accept `POST /cancel`.
pub fn call(command: AppCommand) -> Option<AppResponse> {
    if DISPENSE_ACTIVE.signaled() {
        return None;
    }
    Some(future::block_on(async {
        REQUESTS
            .send(GatewayRequest {
                command,
                awaits_reply: true,
            })
            .await;
        REPLIES.receive().await
    }))
}

/// Queue a dispense without waiting for it.  Returns `false` if one is
/// already queued or running.
///
/// [`DISPENSE_ACTIVE`] is raised before queueing, so a cancel that
/// arrives before the loop picks the command up still counts.
pub fn submit(command: AppCommand) -> bool {
    if DISPENSE_ACTIVE.signaled() {
        return false;
    }
    CANCEL_DISPENSE.reset();
    DISPENSE_ACTIVE.signal(());
    let queued = REQUESTS.try_send(GatewayRequest {
        command,
        awaits_reply: false,
    });
    if queued.is_err() {
        DISPENSE_ACTIVE.reset();
        return false;
    }
    true
}

/// Control-loop side: answer a waiting handler, or release the busy flag
/// held for a submitted dispense.
pub fn complete(awaits_reply: bool, response: AppResponse) {
    if awaits_reply {
        if REPLIES.try_send(response).is_err() {
            warn!("Gateway: reply slot full, response dropped");
        }
        return;
    }
    DISPENSE_ACTIVE.reset();
    CANCEL_DISPENSE.reset();
    match response {
        AppResponse::Rejected(e) => warn!("Gateway: submitted dispense failed: {}", e),
        other => info!("Gateway: submitted dispense finished: {:?}", other),
    }
}

/// Raise the cancel signal if a dispense is running.  Returns whether
/// one was.
pub fn request_cancel() -> bool {
    if DISPENSE_ACTIVE.signaled() {
        CANCEL_DISPENSE.signal(());
        true
    } else {
        false
    }
}
