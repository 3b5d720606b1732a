//! Reconciliation of a task's resolved vocabulary into one ticket update.
//!
//! This is the whole decision surface of the bridge: a status label (however
//! it was resolved) and a type code go in, the Freshdesk payload comes out.
//! Everything here is pure so the pipeline around it stays a straight line.

use serde::{Deserialize, Serialize};

use crate::clickup::StatusDefinition;
use crate::vocab::{StatusVocabulary, TypeVocabulary};

/// The outbound Freshdesk ticket update.
///
/// Serializes to the wire shape `{"status": <code>, "type": <label>}`; the
/// type is optional in the contract even though this bridge always derives
/// one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketUpdate {
    pub status: u16,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ticket_type: Option<String>,
}

/// Combines both vocabularies into the update payload. Total by construction:
/// an unresolved label becomes the default "Open" code and an unknown type
/// code becomes the default type label.
pub fn plan_update(
    label: Option<&str>,
    type_code: &str,
    statuses: &StatusVocabulary,
    types: &TypeVocabulary,
) -> TicketUpdate {
    TicketUpdate {
        status: statuses.resolve(label),
        ticket_type: Some(types.label_for(type_code).to_string()),
    }
}

/// Variant of [`plan_update`] for the list policy, where the status code was
/// already resolved (or not) from the list's live definitions.
pub fn plan_update_with_code(
    code: Option<u16>,
    type_code: &str,
    statuses: &StatusVocabulary,
    types: &TypeVocabulary,
) -> TicketUpdate {
    match code {
        Some(status) => TicketUpdate {
            status,
            ticket_type: Some(types.label_for(type_code).to_string()),
        },
        None => plan_update(None, type_code, statuses, types),
    }
}

/// List-based policy: looks the event's per-list status id up in the id-to-code
/// map built from the list's live status definitions. `None` means the id was
/// absent or unmapped, i.e. the caller falls back to the default code.
pub fn resolve_from_definitions(
    definitions: &[StatusDefinition],
    status_id: Option<&str>,
    statuses: &StatusVocabulary,
) -> Option<u16> {
    let id = status_id?;
    statuses.codes_by_status_id(definitions).get(id).copied()
}
