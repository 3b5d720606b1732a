use async_trait::async_trait;
use http::StatusCode;
use metrics::counter;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::event::StatusField;

/// Production API base; overridable for tests and proxies.
pub const DEFAULT_API_BASE: &str = "https://api.clickup.com/api/v2";

/// One status definition from a list's configured status set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusDefinition {
    #[serde(default)]
    pub id: Option<String>,
    pub status: String,
}

#[async_trait]
pub trait ClickUpApi: Send + Sync {
    /// Live status label of a single task, `None` when the task has no
    /// status set.
    async fn get_task_status(
        &self,
        token: &str,
        task_id: &str,
    ) -> Result<Option<String>, ClickUpError>;

    /// Status definitions configured on a list.
    async fn get_list_statuses(
        &self,
        token: &str,
        list_id: &str,
    ) -> Result<Vec<StatusDefinition>, ClickUpError>;
}

pub struct HttpClickUpApi {
    client: Client,
    api_base: String,
}

impl HttpClickUpApi {
    pub fn new(client: Client, api_base: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ClickUpApi for HttpClickUpApi {
    async fn get_task_status(
        &self,
        token: &str,
        task_id: &str,
    ) -> Result<Option<String>, ClickUpError> {
        let url = format!("{}/task/{}", self.api_base, task_id);
        let response = self
            .client
            .get(url)
            // ClickUp takes the raw personal token, no Bearer prefix.
            .header(AUTHORIZATION, token)
            .send()
            .await
            .map_err(|err| {
                counter!(
                    "clickup_errors_total",
                    "kind" => "transport",
                    "endpoint" => "task.get"
                )
                .increment(1);
                ClickUpError::Transport(err)
            })?;

        let task: RawTask = read_json("task.get", response).await?;
        Ok(task
            .status
            .as_ref()
            .and_then(StatusField::label)
            .map(str::to_string))
    }

    async fn get_list_statuses(
        &self,
        token: &str,
        list_id: &str,
    ) -> Result<Vec<StatusDefinition>, ClickUpError> {
        let url = format!("{}/list/{}", self.api_base, list_id);
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, token)
            .send()
            .await
            .map_err(|err| {
                counter!(
                    "clickup_errors_total",
                    "kind" => "transport",
                    "endpoint" => "list.get"
                )
                .increment(1);
                ClickUpError::Transport(err)
            })?;

        let list: RawList = read_json("list.get", response).await?;
        Ok(list.statuses)
    }
}

async fn read_json<T>(
    endpoint: &'static str,
    response: reqwest::Response,
) -> Result<T, ClickUpError>
where
    T: for<'de> Deserialize<'de>,
{
    let status = response.status();
    if !status.is_success() {
        let status_label = status.as_str().to_string();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable>".into());
        counter!(
            "clickup_errors_total",
            "kind" => "remote",
            "endpoint" => endpoint,
            "status" => status_label
        )
        .increment(1);
        return Err(ClickUpError::Remote {
            status,
            message: truncate(body),
        });
    }

    response.json::<T>().await.map_err(|err| {
        counter!(
            "clickup_errors_total",
            "kind" => "decode",
            "endpoint" => endpoint
        )
        .increment(1);
        ClickUpError::Decode(err)
    })
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
pub enum ClickUpError {
    #[error("clickup transport error")]
    Transport(#[source] reqwest::Error),
    #[error("clickup remote error (status {status})")]
    Remote { status: StatusCode, message: String },
    #[error("clickup response decode error")]
    Decode(#[source] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct RawTask {
    #[serde(default)]
    status: Option<StatusField>,
}

#[derive(Debug, Deserialize)]
struct RawList {
    #[serde(default)]
    statuses: Vec<StatusDefinition>,
}

#[derive(Default)]
pub struct MockClickUpApi {
    pub task_calls: Mutex<Vec<(String, String)>>,
    pub list_calls: Mutex<Vec<(String, String)>>,
    pub task_status: Option<String>,
    pub list_statuses: Vec<StatusDefinition>,
    pub fail: bool,
}

impl MockClickUpApi {
    pub fn with_task_status(label: impl Into<String>) -> Self {
        Self {
            task_status: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn with_list_statuses(statuses: Vec<StatusDefinition>) -> Self {
        Self {
            list_statuses: statuses,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ClickUpApi for MockClickUpApi {
    async fn get_task_status(
        &self,
        token: &str,
        task_id: &str,
    ) -> Result<Option<String>, ClickUpError> {
        self.task_calls
            .lock()
            .await
            .push((token.to_string(), task_id.to_string()));
        if self.fail {
            return Err(mock_failure());
        }
        Ok(self.task_status.clone())
    }

    async fn get_list_statuses(
        &self,
        token: &str,
        list_id: &str,
    ) -> Result<Vec<StatusDefinition>, ClickUpError> {
        self.list_calls
            .lock()
            .await
            .push((token.to_string(), list_id.to_string()));
        if self.fail {
            return Err(mock_failure());
        }
        Ok(self.list_statuses.clone())
    }
}

fn mock_failure() -> ClickUpError {
    ClickUpError::Remote {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: "mock failure".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_task_and_list_bodies() {
        let task: RawTask = serde_json::from_str(
            r##"{"id":"t1","status":{"status":"in progress","id":"sc1","color":"#fff"}}"##,
        )
        .unwrap();
        assert_eq!(
            task.status.as_ref().and_then(StatusField::label),
            Some("in progress")
        );

        let list: RawList = serde_json::from_str(
            r#"{"statuses":[{"id":"sc1","status":"Open","orderindex":0}]}"#,
        )
        .unwrap();
        assert_eq!(
            list.statuses,
            vec![StatusDefinition {
                id: Some("sc1".into()),
                status: "Open".into(),
            }]
        );
    }

    #[test]
    fn truncates_long_error_bodies_on_char_boundaries() {
        let long = "é".repeat(400);
        let cut = truncate(long);
        assert!(cut.len() <= 512);
        assert!(cut.chars().all(|c| c == 'é'));

        assert_eq!(truncate("short".into()), "short");
    }

    #[tokio::test]
    async fn mock_records_calls_and_serves_presets() {
        let mock = MockClickUpApi::with_task_status("In Progress");
        let status = mock.get_task_status("tok_1", "task_1").await.unwrap();
        assert_eq!(status.as_deref(), Some("In Progress"));
        assert_eq!(
            mock.task_calls.lock().await.as_slice(),
            &[("tok_1".to_string(), "task_1".to_string())]
        );
    }

    #[tokio::test]
    async fn failing_mock_surfaces_remote_errors() {
        let mock = MockClickUpApi::failing();
        let err = mock.get_task_status("tok", "task").await.unwrap_err();
        assert!(matches!(err, ClickUpError::Remote { .. }));
    }
}
