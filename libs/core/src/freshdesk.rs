use async_trait::async_trait;
use http::StatusCode;
use metrics::counter;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::reconcile::TicketUpdate;

/// Per-invocation Freshdesk credentials. Borrowed from config so nothing is
/// cached between webhook deliveries.
#[derive(Debug, Clone, Copy)]
pub struct FreshdeskCreds<'a> {
    pub domain: &'a str,
    pub api_key: &'a str,
}

#[async_trait]
pub trait FreshdeskApi: Send + Sync {
    async fn update_ticket(
        &self,
        creds: &FreshdeskCreds<'_>,
        ticket_id: &str,
        update: &TicketUpdate,
    ) -> Result<(), FreshdeskError>;
}

pub struct HttpFreshdeskApi {
    client: Client,
}

impl HttpFreshdeskApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FreshdeskApi for HttpFreshdeskApi {
    async fn update_ticket(
        &self,
        creds: &FreshdeskCreds<'_>,
        ticket_id: &str,
        update: &TicketUpdate,
    ) -> Result<(), FreshdeskError> {
        let url = format!("{}/api/v2/tickets/{}", host_for(creds.domain), ticket_id);
        let response = self
            .client
            .put(url)
            // Freshdesk basic auth: the API key is the username, password is
            // the literal "X".
            .basic_auth(creds.api_key, Some("X"))
            .json(update)
            .send()
            .await
            .map_err(|err| {
                counter!("freshdesk_errors_total", "kind" => "transport").increment(1);
                FreshdeskError::Transport(err)
            })?;

        let status = response.status();
        if !status.is_success() {
            let status_label = status.as_str().to_string();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".into());
            counter!(
                "freshdesk_errors_total",
                "kind" => "remote",
                "status" => status_label
            )
            .increment(1);
            return Err(FreshdeskError::Remote {
                status,
                message: truncate(body),
            });
        }
        Ok(())
    }
}

/// A configured domain is normally bare (`example.freshdesk.com`); one that
/// already carries a scheme is used verbatim so tests can point at plain
/// `http://127.0.0.1:<port>` servers.
fn host_for(domain: &str) -> String {
    let trimmed = domain.trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

fn truncate(body: String) -> String {
    if body.len() <= 512 {
        return body;
    }
    let mut end = 512;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}

#[derive(Debug, Error)]
pub enum FreshdeskError {
    #[error("freshdesk transport error")]
    Transport(#[source] reqwest::Error),
    #[error("freshdesk remote error (status {status})")]
    Remote { status: StatusCode, message: String },
}

#[derive(Default)]
pub struct MockFreshdeskApi {
    pub updates: Mutex<Vec<(String, TicketUpdate)>>,
    pub fail: bool,
}

impl MockFreshdeskApi {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl FreshdeskApi for MockFreshdeskApi {
    async fn update_ticket(
        &self,
        _creds: &FreshdeskCreds<'_>,
        ticket_id: &str,
        update: &TicketUpdate,
    ) -> Result<(), FreshdeskError> {
        self.updates
            .lock()
            .await
            .push((ticket_id.to_string(), update.clone()));
        if self.fail {
            return Err(FreshdeskError::Remote {
                status: StatusCode::BAD_GATEWAY,
                message: "mock failure".into(),
            });
        }
        Ok(())
    }
}
