use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics::counter;
use tracing::{Instrument, info, warn};

use deskbridge_core::clickup::ClickUpApi;
use deskbridge_core::event::{Task, WebhookEvent};
use deskbridge_core::freshdesk::{FreshdeskApi, FreshdeskError};
use deskbridge_core::reconcile::{plan_update, plan_update_with_code, resolve_from_definitions};
use deskbridge_core::vocab::{StatusVocabulary, TypeVocabulary};

use crate::config::{BridgeConfig, StatusSource};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub statuses: Arc<StatusVocabulary>,
    pub types: Arc<TypeVocabulary>,
    pub clickup: Arc<dyn ClickUpApi>,
    pub freshdesk: Arc<dyn FreshdeskApi>,
}

impl AppState {
    /// Builds both vocabularies once; nothing mapping-related is recomputed
    /// per delivery except the per-list id map of the list policy.
    pub fn new(
        config: BridgeConfig,
        clickup: Arc<dyn ClickUpApi>,
        freshdesk: Arc<dyn FreshdeskApi>,
    ) -> Self {
        let types = match config.type_table.clone() {
            Some(table) => TypeVocabulary::with_table(table),
            None => TypeVocabulary::default(),
        };
        Self {
            config: Arc::new(config),
            statuses: Arc::new(StatusVocabulary::default()),
            types: Arc::new(types),
            clickup,
            freshdesk,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/clickup/webhook", post(handle_webhook))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

/// Every 200 the endpoint produces. Benign no-ops are part of the contract:
/// a delivery with nothing to do must not look like a failure to the webhook
/// dispatcher, or it will keep retrying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    NoTicketRef,
    NoListRef,
    Updated { ticket_id: String },
}

impl Outcome {
    fn body(&self) -> &'static str {
        match self {
            Outcome::Ignored => "Ignored: Invalid payload structure",
            Outcome::NoTicketRef => "No Freshdesk Ticket ID found",
            Outcome::NoListRef => "No list reference found",
            Outcome::Updated { .. } => "Updated Freshdesk",
        }
    }

    fn metric_label(&self) -> &'static str {
        match self {
            Outcome::Ignored => "ignored",
            Outcome::NoTicketRef => "no_ticket_ref",
            Outcome::NoListRef => "no_list_ref",
            Outcome::Updated { .. } => "updated",
        }
    }
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        (StatusCode::OK, self.body()).into_response()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("clickup api token not configured")]
    MissingClickUpToken,
    #[error("freshdesk configuration missing")]
    MissingFreshdeskConfig,
    #[error("freshdesk update failed")]
    Freshdesk(#[from] FreshdeskError),
}

impl BridgeError {
    pub fn status(&self) -> StatusCode {
        match self {
            BridgeError::MissingClickUpToken | BridgeError::MissingFreshdeskConfig => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            BridgeError::Freshdesk(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> &'static str {
        match self {
            BridgeError::MissingClickUpToken => "Server Error: ClickUp API token not configured.",
            BridgeError::MissingFreshdeskConfig => "Server Error: Freshdesk configuration missing.",
            BridgeError::Freshdesk(_) => "Failed to update Freshdesk",
        }
    }

    fn metric_label(&self) -> &'static str {
        match self {
            BridgeError::MissingClickUpToken | BridgeError::MissingFreshdeskConfig => {
                "missing_config"
            }
            BridgeError::Freshdesk(_) => "update_failed",
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        (self.status(), self.body()).into_response()
    }
}

async fn handle_webhook(State(state): State<AppState>, body: Bytes) -> Response {
    match process_webhook(&state, &body).await {
        Ok(outcome) => {
            counter!("deskbridge_events_total", "outcome" => outcome.metric_label()).increment(1);
            outcome.into_response()
        }
        Err(err) => {
            counter!("deskbridge_events_total", "outcome" => err.metric_label()).increment(1);
            err.into_response()
        }
    }
}

/// One delivery, one linear pass. Early exits are all `Ok(no-op)`; the only
/// errors are missing configuration and the final update call failing.
async fn process_webhook(state: &AppState, body: &[u8]) -> Result<Outcome, BridgeError> {
    let Some((task_id, task)) = parse_event(body) else {
        warn!("ignoring webhook with invalid payload structure");
        return Ok(Outcome::Ignored);
    };

    let span = tracing::info_span!("webhook.handle", task_id = %task_id);
    handle_task(state, &task_id, &task).instrument(span).await
}

// The body is read raw so an unparseable delivery stays our no-op instead of
// becoming a framework 400.
fn parse_event(body: &[u8]) -> Option<(String, Task)> {
    let event: WebhookEvent = serde_json::from_slice(body).ok()?;
    let task = event.payload?;
    let id = task.id.clone().filter(|id| !id.is_empty())?;
    Some((id, task))
}

async fn handle_task(state: &AppState, task_id: &str, task: &Task) -> Result<Outcome, BridgeError> {
    let token = state
        .config
        .clickup_token
        .as_deref()
        .ok_or(BridgeError::MissingClickUpToken)?;
    let creds = state
        .config
        .freshdesk_creds()
        .ok_or(BridgeError::MissingFreshdeskConfig)?;

    let Some(ticket_id) = task.ticket_ref(&state.config.ticket_field_id) else {
        info!(task_id, "no linked Freshdesk ticket, nothing to do");
        return Ok(Outcome::NoTicketRef);
    };

    let type_code = task.type_code();
    let update = match state.config.status_source {
        StatusSource::Task => {
            let label = lookup_task_label(state, token, task_id).await;
            plan_update(label.as_deref(), &type_code, &state.statuses, &state.types)
        }
        StatusSource::List => {
            let Some(list_id) = task.list_id() else {
                info!(task_id, "event carries no list reference, nothing to do");
                return Ok(Outcome::NoListRef);
            };
            let code = lookup_list_code(state, token, list_id, task.status_id()).await;
            plan_update_with_code(code, &type_code, &state.statuses, &state.types)
        }
    };

    info!(
        task_id,
        ticket_id = %ticket_id,
        status = update.status,
        ticket_type = update.ticket_type.as_deref().unwrap_or_default(),
        "updating Freshdesk ticket"
    );
    state
        .freshdesk
        .update_ticket(&creds, &ticket_id, &update)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, ticket_id = %ticket_id, "freshdesk update failed");
            BridgeError::Freshdesk(err)
        })?;

    counter!("deskbridge_updates_total").increment(1);
    info!(ticket_id = %ticket_id, "updated Freshdesk ticket");
    Ok(Outcome::Updated { ticket_id })
}

/// Best effort: a failed lookup logs, counts, and yields `None` so the
/// pipeline continues with the default status.
async fn lookup_task_label(state: &AppState, token: &str, task_id: &str) -> Option<String> {
    match state.clickup.get_task_status(token, task_id).await {
        Ok(label) => label,
        Err(err) => {
            counter!("deskbridge_lookup_failures_total", "source" => "task").increment(1);
            warn!(error = %err, task_id, "failed to fetch task status, continuing with default");
            None
        }
    }
}

async fn lookup_list_code(
    state: &AppState,
    token: &str,
    list_id: &str,
    status_id: Option<&str>,
) -> Option<u16> {
    match state.clickup.get_list_statuses(token, list_id).await {
        Ok(definitions) => resolve_from_definitions(&definitions, status_id, &state.statuses),
        Err(err) => {
            counter!("deskbridge_lookup_failures_total", "source" => "list").increment(1);
            warn!(error = %err, list_id, "failed to fetch list statuses, continuing with default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_TICKET_FIELD_ID;
    use axum::body::Body;
    use axum::http::{Method, Request, header::CONTENT_TYPE};
    use deskbridge_core::clickup::{DEFAULT_API_BASE, MockClickUpApi, StatusDefinition};
    use deskbridge_core::freshdesk::MockFreshdeskApi;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use tracing_test::traced_test;

    fn test_config() -> BridgeConfig {
        BridgeConfig {
            addr: "127.0.0.1:0".parse().unwrap(),
            clickup_token: Some("pk_test".into()),
            freshdesk_domain: Some("example.freshdesk.com".into()),
            freshdesk_api_key: Some("fd_key".into()),
            ticket_field_id: DEFAULT_TICKET_FIELD_ID.into(),
            status_source: StatusSource::Task,
            clickup_api_base: DEFAULT_API_BASE.into(),
            type_table: None,
        }
    }

    fn build_state(
        config: BridgeConfig,
        clickup: MockClickUpApi,
        freshdesk: MockFreshdeskApi,
    ) -> (AppState, Arc<MockClickUpApi>, Arc<MockFreshdeskApi>) {
        let clickup = Arc::new(clickup);
        let freshdesk = Arc::new(freshdesk);
        let state = AppState::new(config, clickup.clone(), freshdesk.clone());
        (state, clickup, freshdesk)
    }

    fn sample_event() -> Value {
        json!({
            "event": "taskStatusUpdated",
            "payload": {
                "id": "T1",
                "list": { "id": "L9" },
                "status": { "status": "quality assurance", "id": "sc901_qa" },
                "custom_type": 1001,
                "fields": [
                    { "field_id": DEFAULT_TICKET_FIELD_ID, "value": "42" }
                ]
            }
        })
    }

    async fn post_webhook(state: AppState, body: &str) -> (StatusCode, String) {
        send(state, Method::POST, "/clickup/webhook", body).await
    }

    async fn send(state: AppState, method: Method, uri: &str, body: &str) -> (StatusCode, String) {
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_responds_no_content() {
        let (state, _, _) = build_state(
            test_config(),
            MockClickUpApi::default(),
            MockFreshdeskApi::default(),
        );
        let (status, body) = send(state, Method::GET, "/healthz", "").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn non_post_methods_are_rejected() {
        let (state, clickup, freshdesk) = build_state(
            test_config(),
            MockClickUpApi::default(),
            MockFreshdeskApi::default(),
        );
        let (status, _) = send(state, Method::GET, "/clickup/webhook", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert!(clickup.task_calls.lock().await.is_empty());
        assert!(freshdesk.updates.lock().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_a_no_op() {
        let (state, clickup, freshdesk) = build_state(
            test_config(),
            MockClickUpApi::default(),
            MockFreshdeskApi::default(),
        );
        let (status, body) = post_webhook(state, "{not json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Ignored: Invalid payload structure");
        assert!(clickup.task_calls.lock().await.is_empty());
        assert!(freshdesk.updates.lock().await.is_empty());
    }

    #[tokio::test]
    async fn missing_task_id_is_a_no_op() {
        let (state, _, freshdesk) = build_state(
            test_config(),
            MockClickUpApi::default(),
            MockFreshdeskApi::default(),
        );
        let event = json!({ "payload": { "status": "open" } });
        let (status, body) = post_webhook(state, &event.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Ignored: Invalid payload structure");
        assert!(freshdesk.updates.lock().await.is_empty());
    }

    #[tokio::test]
    async fn empty_task_id_is_a_no_op() {
        let (state, _, freshdesk) = build_state(
            test_config(),
            MockClickUpApi::default(),
            MockFreshdeskApi::default(),
        );
        let event = json!({ "payload": { "id": "", "status": "open" } });
        let (status, body) = post_webhook(state, &event.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Ignored: Invalid payload structure");
        assert!(freshdesk.updates.lock().await.is_empty());
    }

    #[tokio::test]
    async fn missing_clickup_token_is_fatal() {
        let mut config = test_config();
        config.clickup_token = None;
        let (state, clickup, freshdesk) = build_state(
            config,
            MockClickUpApi::with_task_status("In Progress"),
            MockFreshdeskApi::default(),
        );
        let (status, body) = post_webhook(state, &sample_event().to_string()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Server Error: ClickUp API token not configured.");
        assert!(clickup.task_calls.lock().await.is_empty());
        assert!(freshdesk.updates.lock().await.is_empty());
    }

    #[tokio::test]
    async fn missing_freshdesk_config_is_fatal() {
        let mut config = test_config();
        config.freshdesk_api_key = None;
        let (state, clickup, freshdesk) = build_state(
            config,
            MockClickUpApi::with_task_status("In Progress"),
            MockFreshdeskApi::default(),
        );
        let (status, body) = post_webhook(state, &sample_event().to_string()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Server Error: Freshdesk configuration missing.");
        assert!(clickup.task_calls.lock().await.is_empty());
        assert!(freshdesk.updates.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unlinked_task_is_a_no_op() {
        let (state, clickup, freshdesk) = build_state(
            test_config(),
            MockClickUpApi::with_task_status("In Progress"),
            MockFreshdeskApi::default(),
        );
        let event = json!({
            "payload": {
                "id": "T1",
                "fields": [ { "field_id": "some-other-field", "value": "42" } ]
            }
        });
        let (status, body) = post_webhook(state, &event.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "No Freshdesk Ticket ID found");
        assert!(clickup.task_calls.lock().await.is_empty());
        assert!(freshdesk.updates.lock().await.is_empty());
    }

    #[tokio::test]
    async fn propagates_status_and_type_onto_the_ticket() {
        let (state, clickup, freshdesk) = build_state(
            test_config(),
            MockClickUpApi::with_task_status("Quality Assurance"),
            MockFreshdeskApi::default(),
        );
        let (status, body) = post_webhook(state, &sample_event().to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Updated Freshdesk");

        let task_calls = clickup.task_calls.lock().await;
        assert_eq!(
            task_calls.as_slice(),
            &[("pk_test".to_string(), "T1".to_string())]
        );

        let updates = freshdesk.updates.lock().await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, "42");
        assert_eq!(updates[0].1.status, 16);
        assert_eq!(updates[0].1.ticket_type.as_deref(), Some("Report a Bug"));
    }

    #[tokio::test]
    async fn numeric_ticket_refs_are_accepted() {
        let (state, _, freshdesk) = build_state(
            test_config(),
            MockClickUpApi::with_task_status("Closed"),
            MockFreshdeskApi::default(),
        );
        let event = json!({
            "payload": {
                "id": "T2",
                "fields": [ { "field_id": DEFAULT_TICKET_FIELD_ID, "value": 907 } ]
            }
        });
        let (status, body) = post_webhook(state, &event.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Updated Freshdesk");

        let updates = freshdesk.updates.lock().await;
        assert_eq!(updates[0].0, "907");
        assert_eq!(updates[0].1.status, 5);
        assert_eq!(updates[0].1.ticket_type.as_deref(), Some("General Enquiry"));
    }

    #[traced_test]
    #[tokio::test]
    async fn lookup_failure_still_updates_with_default_status() {
        let (state, _, freshdesk) = build_state(
            test_config(),
            MockClickUpApi::failing(),
            MockFreshdeskApi::default(),
        );
        let (status, body) = post_webhook(state, &sample_event().to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Updated Freshdesk");
        assert!(logs_contain("failed to fetch task status"));

        let updates = freshdesk.updates.lock().await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].1.status, 2);
        assert_eq!(updates[0].1.ticket_type.as_deref(), Some("Report a Bug"));
    }

    #[tokio::test]
    async fn update_failure_is_a_server_error() {
        let (state, _, freshdesk) = build_state(
            test_config(),
            MockClickUpApi::with_task_status("Quality Assurance"),
            MockFreshdeskApi::failing(),
        );
        let (status, body) = post_webhook(state, &sample_event().to_string()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Failed to update Freshdesk");
        assert_eq!(freshdesk.updates.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn list_policy_requires_a_list_reference() {
        let mut config = test_config();
        config.status_source = StatusSource::List;
        let (state, clickup, freshdesk) = build_state(
            config,
            MockClickUpApi::default(),
            MockFreshdeskApi::default(),
        );
        let event = json!({
            "payload": {
                "id": "T1",
                "status": { "status": "quality assurance", "id": "sc901_qa" },
                "fields": [ { "field_id": DEFAULT_TICKET_FIELD_ID, "value": "42" } ]
            }
        });
        let (status, body) = post_webhook(state, &event.to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "No list reference found");
        assert!(clickup.list_calls.lock().await.is_empty());
        assert!(freshdesk.updates.lock().await.is_empty());
    }

    #[tokio::test]
    async fn list_policy_resolves_via_definitions() {
        let mut config = test_config();
        config.status_source = StatusSource::List;
        let definitions = vec![
            StatusDefinition {
                id: Some("sc901_qa".into()),
                status: "Quality Assurance".into(),
            },
            StatusDefinition {
                id: Some("sc901_done".into()),
                status: "Done".into(),
            },
        ];
        let (state, clickup, freshdesk) = build_state(
            config,
            MockClickUpApi::with_list_statuses(definitions),
            MockFreshdeskApi::default(),
        );
        let (status, body) = post_webhook(state, &sample_event().to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Updated Freshdesk");

        let list_calls = clickup.list_calls.lock().await;
        assert_eq!(
            list_calls.as_slice(),
            &[("pk_test".to_string(), "L9".to_string())]
        );
        assert!(clickup.task_calls.lock().await.is_empty());

        let updates = freshdesk.updates.lock().await;
        assert_eq!(updates[0].1.status, 16);
    }

    #[tokio::test]
    async fn list_policy_defaults_on_unmapped_status_id() {
        let mut config = test_config();
        config.status_source = StatusSource::List;
        let definitions = vec![StatusDefinition {
            id: Some("sc901_other".into()),
            status: "Quality Assurance".into(),
        }];
        let (state, _, freshdesk) = build_state(
            config,
            MockClickUpApi::with_list_statuses(definitions),
            MockFreshdeskApi::default(),
        );
        let (status, _) = post_webhook(state, &sample_event().to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(freshdesk.updates.lock().await[0].1.status, 2);
    }

    #[traced_test]
    #[tokio::test]
    async fn list_policy_lookup_failure_defaults_to_open() {
        let mut config = test_config();
        config.status_source = StatusSource::List;
        let (state, clickup, freshdesk) = build_state(
            config,
            MockClickUpApi::failing(),
            MockFreshdeskApi::default(),
        );
        let (status, body) = post_webhook(state, &sample_event().to_string()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Updated Freshdesk");
        assert!(logs_contain("failed to fetch list statuses"));

        assert_eq!(clickup.list_calls.lock().await.len(), 1);
        let updates = freshdesk.updates.lock().await;
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].1.status, 2);
        assert_eq!(updates[0].1.ticket_type.as_deref(), Some("Report a Bug"));
    }

    #[tokio::test]
    async fn type_table_override_changes_the_label() {
        let mut config = test_config();
        config.type_table = Some(std::collections::HashMap::from([(
            "1001".to_string(),
            "Defect".to_string(),
        )]));
        let (state, _, freshdesk) = build_state(
            config,
            MockClickUpApi::with_task_status("Open"),
            MockFreshdeskApi::default(),
        );
        let (status, _) = post_webhook(state, &sample_event().to_string()).await;
        assert_eq!(status, StatusCode::OK);

        let updates = freshdesk.updates.lock().await;
        assert_eq!(updates[0].1.ticket_type.as_deref(), Some("Defect"));
        assert_eq!(updates[0].1.status, 2);
    }
}
