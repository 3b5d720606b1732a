//! Deskbridge core contracts and connectors.
//!
//! This crate holds everything the webhook service shares: the serde model of
//! inbound ClickUp task events, the status/type vocabularies that translate
//! ClickUp wording into Freshdesk codes, the reconciliation step that combines
//! them into one ticket update, and the HTTP connectors for both systems.
pub mod clickup;
pub mod event;
pub mod freshdesk;
pub mod reconcile;
pub mod vocab;

pub use clickup::*;
pub use event::*;
pub use freshdesk::*;
pub use reconcile::*;
pub use vocab::*;
