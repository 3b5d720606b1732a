use std::collections::HashMap;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use deskbridge_core::clickup::DEFAULT_API_BASE;
use deskbridge_core::freshdesk::FreshdeskCreds;

/// Custom-field id the original deployment used for the linked ticket.
pub const DEFAULT_TICKET_FIELD_ID: &str = "c6d06740-a69d-4942-8cf2-5b0823d0a806";

/// Where the status label comes from.
///
/// `Task` asks ClickUp for the single task's live status label. `List` reads
/// the per-list status id off the event and resolves it against the list's
/// status definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusSource {
    #[default]
    Task,
    List,
}

impl StatusSource {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "list" => StatusSource::List,
            _ => StatusSource::Task,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub addr: SocketAddr,
    /// Credentials stay optional at boot; their absence is reported per
    /// delivery as a 500 instead of refusing to start.
    pub clickup_token: Option<String>,
    pub freshdesk_domain: Option<String>,
    pub freshdesk_api_key: Option<String>,
    pub ticket_field_id: String,
    pub status_source: StatusSource,
    pub clickup_api_base: String,
    /// Replacement type table, for Freshdesk instances with different ticket
    /// types. `None` keeps the built-in table.
    pub type_table: Option<HashMap<String, String>>,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self> {
        let addr = std::env::var("BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".into())
            .parse()
            .context("invalid BIND address")?;
        let type_table = match non_empty(std::env::var("FRESHDESK_TYPE_MAP").ok()) {
            Some(raw) => Some(
                serde_json::from_str(&raw)
                    .context("FRESHDESK_TYPE_MAP must be a JSON object of code to label")?,
            ),
            None => None,
        };

        Ok(Self {
            addr,
            clickup_token: non_empty(std::env::var("CLICKUP_API_TOKEN").ok()),
            freshdesk_domain: non_empty(std::env::var("FRESHDESK_DOMAIN").ok()),
            freshdesk_api_key: non_empty(std::env::var("FRESHDESK_API_KEY").ok()),
            ticket_field_id: std::env::var("CLICKUP_TICKET_FIELD_ID")
                .unwrap_or_else(|_| DEFAULT_TICKET_FIELD_ID.into()),
            status_source: std::env::var("STATUS_SOURCE")
                .map(|raw| StatusSource::parse(&raw))
                .unwrap_or_default(),
            clickup_api_base: std::env::var("CLICKUP_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.into()),
            type_table,
        })
    }

    /// Both Freshdesk values, or `None` when either is missing.
    pub fn freshdesk_creds(&self) -> Option<FreshdeskCreds<'_>> {
        match (
            self.freshdesk_domain.as_deref(),
            self.freshdesk_api_key.as_deref(),
        ) {
            (Some(domain), Some(api_key)) => Some(FreshdeskCreds { domain, api_key }),
            _ => None,
        }
    }
}

// Empty env values count as unset, same as the original deployment.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
