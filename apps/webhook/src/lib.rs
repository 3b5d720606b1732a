//! ClickUp to Freshdesk webhook bridge.
//!
//! One endpoint receives task-update events from ClickUp; each delivery is a
//! stateless pass that resolves the linked Freshdesk ticket and issues a
//! single status/type update against it.

pub mod config;
pub mod http;

pub use config::{BridgeConfig, StatusSource};
pub use http::{AppState, BridgeError, Outcome, router};
