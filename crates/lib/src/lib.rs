//! Messenger webhook receiver: subscription verification, typed event model,
//! event classification, and dispatch to an application-supplied handler.

pub mod config;
pub mod event;
pub mod init;
pub mod webhook;
