//! Configuration gateway: the HTTP boundary of the device.
//!
//! - [`router`] turns method, path and body into an
//!   [`AppCommand`](crate::app::commands::AppCommand) and renders the
//!   [`AppResponse`](crate::app::commands::AppResponse) as JSON.
//! - [`messages`] holds the serde request/reply documents.
//! - [`channels`] bridges server handler threads to the control loop.

pub mod channels;
pub mod messages;
pub mod router;

pub use router::{HttpReply, Method, Route, render, route};
