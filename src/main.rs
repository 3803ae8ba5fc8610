//! PillDispenser Firmware: Main Entry Point
//!
//! Hexagonal architecture with a fixed-period control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsAdapter   SntpClock       │
//! │  (DispenserPort)   (EventSink)    (Config+NVS) (ClockPort)     │
//! │  WifiAdapter       EspHttpServer ──▶ gateway channels          │
//! │  (Connectivity)                                                │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  DispenseEngine · Schedule · persistence codec         │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use std::time::{Duration, Instant};

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::ledc::{LedcDriver, LedcTimerDriver, Resolution, config::TimerConfig};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::prelude::*;
use esp_idf_svc::http::Method as HttpMethod;
use esp_idf_svc::http::server::{Configuration as HttpConfig, EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::io::{Read, Write};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{info, warn};

use pilldispenser::adapters::board::Board;
use pilldispenser::adapters::hardware::{HardwareAdapter, PulseProfile};
use pilldispenser::adapters::log_sink::{LogEventSink, log_status};
use pilldispenser::adapters::nvs::NvsAdapter;
use pilldispenser::adapters::time::SntpClock;
use pilldispenser::adapters::wifi::WifiAdapter;
use pilldispenser::app::ports::{ConfigPort, ConnectivityPort};
use pilldispenser::app::service::AppService;
use pilldispenser::config::DispenserConfig;
use pilldispenser::drivers::servo::ServoDriver;
use pilldispenser::gateway::channels::{self, CANCEL_DISPENSE, DISPENSE_ACTIVE, REQUESTS};
use pilldispenser::gateway::{self, Method, Route, router};
use pilldispenser::persistence;

/// Servo frame rate.
const SERVO_PWM_HZ: u32 = 50;

/// Largest request body the gateway accepts.
const MAX_BODY: usize = 2048;

const ROUTES: [(&str, HttpMethod); 6] = [
    ("/info", HttpMethod::Get),
    ("/schedule", HttpMethod::Get),
    ("/configure_wifi", HttpMethod::Post),
    ("/configure_schedule", HttpMethod::Post),
    ("/dispense", HttpMethod::Post),
    ("/cancel", HttpMethod::Post),
];

// ── HTTP gateway ──────────────────────────────────────────────

fn read_body(req: &mut Request<&mut EspHttpConnection>) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut chunk = [0u8; 256];
    loop {
        let n = req.read(&mut chunk).map_err(|e| anyhow::anyhow!("{e:?}"))?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
        if body.len() > MAX_BODY {
            anyhow::bail!("request body too large");
        }
    }
    Ok(body)
}

/// Route one request and write the reply.  Runs on the HTTP server task.
fn serve(mut req: Request<&mut EspHttpConnection>, method: Method) -> Result<()> {
    let uri = req.uri().to_owned();
    let reply = match read_body(&mut req) {
        Ok(body) => match gateway::route(method, &uri, &body) {
            Route::Reply(reply) => reply,
            Route::Cancel => router::cancel_reply(channels::request_cancel()),
            Route::Command(cmd) => {
                channels::call(cmd).map_or_else(router::busy_reply, |r| gateway::render(&r))
            }
            Route::Submit(cmd) => {
                if channels::submit(cmd) {
                    router::dispense_started()
                } else {
                    router::busy_reply()
                }
            }
        },
        Err(e) => {
            warn!("Gateway: {}", e);
            gateway::HttpReply::error(400, "Invalid JSON")
        }
    };

    let headers: Vec<(&str, &str)> = reply.headers().collect();
    let mut resp = req
        .into_response(reply.status, None, &headers)
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;
    resp.write_all(reply.body.as_bytes())
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;
    Ok(())
}

fn start_gateway() -> Result<EspHttpServer<'static>> {
    let config = HttpConfig {
        uri_match_wildcard: true,
        ..Default::default()
    };
    let mut server = EspHttpServer::new(&config)?;
    for (path, http_method) in ROUTES {
        let method = match http_method {
            HttpMethod::Get => Method::Get,
            _ => Method::Post,
        };
        server.fn_handler(path, http_method, move |req| serve(req, method))?;
    }
    // CORS preflight on every path.
    server.fn_handler("/*", HttpMethod::Options, |req| serve(req, Method::Options))?;
    info!("Gateway: HTTP server listening on port 80");
    Ok(server)
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PillDispenser v{}                   ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let partition = EspDefaultNvsPartition::take()?;

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let mut nvs = NvsAdapter::new(partition.clone());
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            DispenserConfig::default()
        }
    };

    // ── 3. Construct adapters ─────────────────────────────────
    let timer = LedcTimerDriver::new(
        peripherals.ledc.timer0,
        &TimerConfig::new()
            .frequency(SERVO_PWM_HZ.Hz().into())
            .resolution(Resolution::Bits14),
    )?;
    let pwm = LedcDriver::new(peripherals.ledc.channel0, &timer, peripherals.pins.gpio18)?;

    let mut dispenser = HardwareAdapter::new(
        ServoDriver::new(pwm),
        FreeRtos,
        PulseProfile::from(&config),
        &CANCEL_DISPENSE,
        &DISPENSE_ACTIVE,
    );
    if let Err(e) = dispenser.home() {
        warn!("Servo home failed: {:?}", e);
    }

    let wifi = WifiAdapter::new(peripherals.modem, sysloop, partition)?;
    let clock = SntpClock::new()?;
    let mut board = Board::new(clock, dispenser, wifi);
    let mut log_sink = LogEventSink::new();

    // ── 4. Construct app service ──────────────────────────────
    let mut app = AppService::new();
    app.start(&nvs, &mut board, &mut log_sink);

    if let Some(creds) = persistence::load_wifi_credentials(&nvs) {
        info!("Rejoining saved network '{}'", creds.ssid);
        if let Err(e) = board.connect(&creds.ssid, &creds.password) {
            warn!("Saved network unavailable: {}", e);
        }
    }

    let _server = start_gateway()?;

    info!("System ready. Entering control loop.");

    // ── 5. Control loop ───────────────────────────────────────
    let tick = Duration::from_millis(u64::from(config.tick_interval_ms));
    let refresh = Duration::from_millis(u64::from(config.status_refresh_ms));
    let mut last_status = Instant::now();

    loop {
        while let Ok(request) = REQUESTS.try_receive() {
            let awaits_reply = request.awaits_reply;
            let response = app.handle_command(request.command, &mut board, &mut nvs, &mut log_sink);
            channels::complete(awaits_reply, response);
        }

        app.tick(&mut board, &mut log_sink);

        if last_status.elapsed() >= refresh {
            log_status(&app.status(&board));
            last_status = Instant::now();
        }

        FreeRtos::delay_ms(tick.as_millis() as u32);
    }
}
