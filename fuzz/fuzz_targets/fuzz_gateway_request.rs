//! Fuzz target: gateway `route`
//!
//! Drives arbitrary bodies into every POST route.  Routing must never
//! panic, and any schedule or dispense it forwards must already be valid.
//!
//! cargo fuzz run fuzz_gateway_request

#![no_main]

use libfuzzer_sys::fuzz_target;
use pilldispenser::app::commands::AppCommand;
use pilldispenser::gateway::{Method, Route, route};

const PATHS: [&str; 4] = ["/configure_wifi", "/configure_schedule", "/dispense", "/cancel"];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, body)) = data.split_first() else {
        return;
    };
    let path = PATHS[usize::from(selector) % PATHS.len()];

    match route(Method::Post, path, body) {
        Route::Command(AppCommand::SetSchedule(events)) => {
            assert!(events.iter().all(|e| e.validate().is_ok()));
        }
        Route::Submit(AppCommand::ManualDispense { quantity }) => assert!(quantity > 0),
        Route::Reply(reply) => assert!(reply.status >= 200 && reply.status < 600),
        _ => {}
    }
});
