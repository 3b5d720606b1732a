//! Serde model of inbound ClickUp webhook events.
//!
//! ClickUp posts an envelope of the form `{ "event": "...", "payload": { ... } }`.
//! Every field is optional here: deliveries with surprising shapes must parse
//! far enough for the pipeline to decide they are a no-op, so nothing in this
//! model hard-fails on absence.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub payload: Option<Task>,
}

/// The task snapshot embedded in a webhook delivery.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Task {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub list: Option<ListRef>,
    #[serde(default)]
    pub status: Option<StatusField>,
    #[serde(default)]
    pub custom_type: Option<Value>,
    #[serde(default)]
    pub fields: Vec<CustomField>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListRef {
    #[serde(default)]
    pub id: Option<String>,
}

/// ClickUp reports a task status either as `{ "status": "Label", "id": "..." }`
/// or as a flat string, depending on the endpoint and event shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StatusField {
    Detailed(StatusDetail),
    Label(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StatusDetail {
    #[serde(default)]
    pub status: Option<String>,
    /// Per-list status identifier, e.g. `"sc901_abc"`.
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CustomField {
    #[serde(default)]
    pub field_id: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
}

impl StatusField {
    pub fn label(&self) -> Option<&str> {
        match self {
            StatusField::Detailed(detail) => detail.status.as_deref(),
            StatusField::Label(label) => Some(label.as_str()),
        }
    }

    pub fn status_id(&self) -> Option<&str> {
        match self {
            StatusField::Detailed(detail) => detail.id.as_deref(),
            StatusField::Label(_) => None,
        }
    }
}

impl Task {
    /// Looks up the linked helpdesk ticket reference in the task's custom
    /// fields. Blank strings and non-scalar values count as absent: an empty
    /// custom field means "not linked", not "linked to ticket \"\"".
    pub fn ticket_ref(&self, field_id: &str) -> Option<String> {
        self.fields
            .iter()
            .find(|field| field.field_id.as_deref() == Some(field_id))
            .and_then(|field| field.value.as_ref())
            .and_then(scalar_to_ref)
    }

    pub fn status_label(&self) -> Option<&str> {
        self.status.as_ref().and_then(StatusField::label)
    }

    pub fn status_id(&self) -> Option<&str> {
        self.status.as_ref().and_then(StatusField::status_id)
    }

    pub fn list_id(&self) -> Option<&str> {
        self.list.as_ref().and_then(|list| list.id.as_deref())
    }

    /// Type code as a string, `"0"` when the task carries none.
    pub fn type_code(&self) -> String {
        match self.custom_type.as_ref() {
            Some(Value::Number(code)) => code.to_string(),
            Some(Value::String(code)) if !code.trim().is_empty() => code.trim().to_string(),
            _ => "0".to_string(),
        }
    }
}

fn scalar_to_ref(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => {
            let trimmed = raw.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        // Zero is the field's cleared state, not a real ticket id.
        Value::Number(raw) => (raw.as_f64() != Some(0.0)).then(|| raw.to_string()),
        _ => None,
    }
}
