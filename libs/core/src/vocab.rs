//! Status and type vocabularies.
//!
//! Freshdesk identifies ticket statuses by numeric codes and ticket types by
//! labels; ClickUp speaks human-readable status labels and numeric type codes.
//! The tables here are the bridge. Lookups are total: anything the tables do
//! not know collapses to a fixed fallback instead of failing, because a status
//! we cannot translate is still a ticket worth updating.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::clickup::StatusDefinition;

/// Freshdesk status code used whenever no label resolves: "Open".
pub const DEFAULT_STATUS_OPEN: u16 = 2;

/// Freshdesk ticket type used whenever no code resolves.
pub const DEFAULT_TYPE_LABEL: &str = "General Enquiry";

/// Fixed table of normalized ClickUp status labels to Freshdesk status codes.
/// The first block mirrors the Freshdesk status field definition; the second
/// block maps ClickUp wording aliases onto the same codes.
static STATUS_BY_LABEL: Lazy<HashMap<&'static str, u16>> = Lazy::new(|| {
    HashMap::from([
        ("ticket created", 8),
        ("submitted for review", 9),
        ("under review", 10),
        ("awaiting authorisation", 12),
        ("please action", 13),
        ("scheduled", 14),
        ("in progress", 15),
        ("quality assurance", 16),
        ("awaiting client approval", 17),
        ("authorised by client", 20),
        ("denied by client", 19),
        ("open", 2),
        ("pending", 3),
        ("resolved", 4),
        ("closed", 5),
        // ClickUp aliases.
        ("awaiting approval", 17),
        ("done", 4),
        ("complete", 5),
        ("denied", 19),
        ("investigation", 2),
    ])
});

static TYPE_BY_CODE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("1003", "Make a Request"),
        ("1001", "Report a Bug"),
        ("0", DEFAULT_TYPE_LABEL),
    ])
});

/// Lowercases a label, trims it, and collapses internal whitespace runs so
/// that wording variants ("Quality  Assurance", "quality assurance") hit the
/// same table entry.
pub fn normalize_label(raw: &str) -> String {
    raw.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized status label to Freshdesk status code.
#[derive(Debug, Clone)]
pub struct StatusVocabulary {
    by_label: HashMap<String, u16>,
    default_code: u16,
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        Self {
            by_label: STATUS_BY_LABEL
                .iter()
                .map(|(label, code)| ((*label).to_string(), *code))
                .collect(),
            default_code: DEFAULT_STATUS_OPEN,
        }
    }
}

impl StatusVocabulary {
    pub fn code_for(&self, label: &str) -> Option<u16> {
        self.by_label.get(&normalize_label(label)).copied()
    }

    pub fn default_code(&self) -> u16 {
        self.default_code
    }

    /// Total translation: unmapped or missing labels fall back to the default
    /// code, with a warning so unexpected vocabulary shows up in the logs.
    pub fn resolve(&self, label: Option<&str>) -> u16 {
        match label {
            Some(label) => self.code_for(label).unwrap_or_else(|| {
                tracing::warn!(%label, code = self.default_code, "no status mapping, defaulting");
                self.default_code
            }),
            None => {
                tracing::warn!(code = self.default_code, "no status label resolved, defaulting");
                self.default_code
            }
        }
    }

    /// Builds the per-list status-id map for the list-based resolution policy
    /// by normalizing each live definition's label against this table.
    /// Definitions whose label is unknown are skipped.
    pub fn codes_by_status_id(&self, definitions: &[StatusDefinition]) -> HashMap<String, u16> {
        definitions
            .iter()
            .filter_map(|definition| {
                let id = definition.id.as_ref()?;
                let code = self.code_for(&definition.status)?;
                Some((id.clone(), code))
            })
            .collect()
    }
}

/// Task type code (as a string) to Freshdesk ticket type label.
#[derive(Debug, Clone)]
pub struct TypeVocabulary {
    by_code: HashMap<String, String>,
    default_label: String,
}

impl Default for TypeVocabulary {
    fn default() -> Self {
        Self {
            by_code: TYPE_BY_CODE
                .iter()
                .map(|(code, label)| ((*code).to_string(), (*label).to_string()))
                .collect(),
            default_label: DEFAULT_TYPE_LABEL.to_string(),
        }
    }
}

impl TypeVocabulary {
    /// Replaces the whole table, for deployments whose Freshdesk instance
    /// defines different ticket types. The fallback label is unchanged.
    pub fn with_table(by_code: HashMap<String, String>) -> Self {
        Self {
            by_code,
            default_label: DEFAULT_TYPE_LABEL.to_string(),
        }
    }

    pub fn label_for(&self, code: &str) -> &str {
        self.by_code
            .get(code)
            .map(String::as_str)
            .unwrap_or(&self.default_label)
    }
}
