//! Webhook endpoint: verification handshake (GET) and event delivery (POST).
//!
//! One route serves both verbs; any other method gets 405. Decoded events are
//! classified and passed to an [`EventHandler`] supplied at construction.

mod handler;
mod server;
mod verify;

pub use handler::EventHandler;
pub use server::{decode_event, run_server, WebhookError, WebhookServer};
pub use verify::{verify, Verification, VerifyQuery};
