use crate::application::ports::fetcher::{FetchRequest, FetchResponse, Fetcher};
use crate::application::ports::server_api::{BatchItemOutcome, ReplayOutcome, ServerApi};
use crate::domain::entities::{QueuedChange, acknowledgement_path};
use crate::domain::entities::offline_record::id_of;
use crate::domain::value_objects::{ChangeAction, Collection};
use crate::shared::config::ServerConfig;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

pub const LOCAL_ID_HEADER: &str = "X-Local-Id";
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// `reqwest` adapter for the dashboard REST API.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: Url,
    health_path: String,
    batch_path: String,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    #[serde(default)]
    results: Vec<BatchResult>,
}

#[derive(Debug, Deserialize)]
struct BatchResult {
    id: i64,
    #[serde(default)]
    status: Option<BatchStatus>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    server_id: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

/// Per-item status: an HTTP code or a label such as `"ok"`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BatchStatus {
    Code(u16),
    Label(String),
}

const SUCCESS_LABELS: &[&str] = &[
    "ok",
    "success",
    "succeeded",
    "applied",
    "created",
    "updated",
    "deleted",
];

impl BatchResult {
    fn succeeded(&self) -> bool {
        match &self.status {
            Some(BatchStatus::Code(code)) => (200..300).contains(code),
            Some(BatchStatus::Label(label)) => SUCCESS_LABELS
                .iter()
                .any(|known| label.eq_ignore_ascii_case(known)),
            None => self.success.unwrap_or(false),
        }
    }

    fn failure_status(&self) -> u16 {
        match self.status {
            Some(BatchStatus::Code(code)) if !(200..300).contains(&code) => code,
            _ => 500,
        }
    }
}

impl RestClient {
    pub fn new(config: &ServerConfig) -> Result<Self, AppError> {
        let base_url = Url::parse(&config.base_url)?;
        let mut builder = Client::builder();
        if config.request_timeout > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout));
        }
        let client = builder
            .build()
            .map_err(|err| AppError::ConfigurationError(format!("HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url,
            health_path: config.health_path.clone(),
            batch_path: config.batch_path.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        Ok(self.base_url.join(path)?)
    }

    async fn error_for(response: reqwest::Response) -> AppError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        AppError::from_status(status, body)
    }
}

fn method_for(action: ChangeAction) -> Method {
    match action {
        ChangeAction::Create => Method::POST,
        ChangeAction::Update => Method::PUT,
        ChangeAction::Delete => Method::DELETE,
    }
}

fn parse_json_body(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(bytes).ok()
}

fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Collection payloads arrive either bare or wrapped as `{"data": [...]}`.
fn collection_items(body: Value) -> Result<Vec<Value>, AppError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("data").or_else(|| map.remove("items")) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(AppError::SerializationError(
                "Collection response is not a list".to_string(),
            )),
        },
        _ => Err(AppError::SerializationError(
            "Collection response is not a list".to_string(),
        )),
    }
}

fn batch_outcomes(changes: &[QueuedChange], response: BatchResponse) -> Vec<BatchItemOutcome> {
    let mut results: HashMap<i64, BatchResult> = response
        .results
        .into_iter()
        .map(|result| (result.id, result))
        .collect();

    changes
        .iter()
        .map(|change| {
            let result = match results.remove(&change.id) {
                Some(result) if result.succeeded() => Ok(ReplayOutcome {
                    server_id: result
                        .server_id
                        .as_ref()
                        .and_then(value_to_id)
                        .or_else(|| result.data.as_ref().and_then(id_of)),
                    body: result.data,
                }),
                Some(result) => {
                    let status = result.failure_status();
                    Err(AppError::from_status(
                        status,
                        result.error.unwrap_or_else(|| "batch item failed".to_string()),
                    ))
                }
                None => Err(AppError::Server {
                    status: 502,
                    message: format!("batch response omitted change {}", change.id),
                }),
            };
            BatchItemOutcome {
                change_id: change.id,
                result,
            }
        })
        .collect()
}

#[async_trait]
impl ServerApi for RestClient {
    async fn health(&self) -> Result<(), AppError> {
        let url = self.endpoint(&self.health_path)?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        Ok(())
    }

    async fn replay(&self, change: &QueuedChange) -> Result<ReplayOutcome, AppError> {
        if let Some((alert_id, at)) = change.acknowledgement() {
            self.acknowledge_alert(&alert_id, at).await?;
            return Ok(ReplayOutcome::default());
        }
        let path = change.endpoint_path().map_err(AppError::ValidationError)?;
        let url = self.endpoint(&path)?;

        let mut request = self
            .client
            .request(method_for(change.action), url)
            .header(IDEMPOTENCY_KEY_HEADER, &change.idempotency_key);
        if let Some(local_id) = change.local_id.as_ref() {
            request = request.header(LOCAL_ID_HEADER, local_id.as_str());
        }
        if change.action != ChangeAction::Delete {
            request = request.json(&change.payload);
        }

        let response = request.send().await?;
        let status = response.status();
        if change.action == ChangeAction::Delete && status == StatusCode::NOT_FOUND {
            // Already gone: an earlier attempt reached the server.
            return Ok(ReplayOutcome::default());
        }
        if !status.is_success() {
            return Err(Self::error_for(response).await);
        }

        let bytes = response.bytes().await?;
        let body = parse_json_body(&bytes);
        Ok(ReplayOutcome {
            server_id: body.as_ref().and_then(id_of),
            body,
        })
    }

    async fn replay_batch(
        &self,
        changes: &[QueuedChange],
    ) -> Result<Vec<BatchItemOutcome>, AppError> {
        let url = self.endpoint(&self.batch_path)?;
        let response = self
            .client
            .post(url)
            .json(&json!({ "changes": changes }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let parsed: BatchResponse = response.json().await?;
        Ok(batch_outcomes(changes, parsed))
    }

    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<Value>, AppError> {
        let path = collection.endpoint().ok_or_else(|| {
            AppError::ValidationError(format!("Collection {collection} has no endpoint"))
        })?;
        let response = self.client.get(self.endpoint(path)?).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        let body: Value = response.json().await?;
        collection_items(body)
    }

    async fn acknowledge_alert(
        &self,
        alert_id: &str,
        acknowledged_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let url = self.endpoint(&acknowledgement_path(alert_id))?;
        let response = self
            .client
            .post(url)
            .json(&json!({ "acknowledged_at": acknowledged_at }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        Ok(())
    }
}

#[async_trait]
impl Fetcher for RestClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, AppError> {
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|err| AppError::ValidationError(format!("Invalid method: {err}")))?;

        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body.clone() {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| AppError::Network(err.to_string()))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|err| AppError::Network(err.to_string()))?;

        Ok(FetchResponse {
            status,
            content_type,
            body,
            opaque: false,
        })
    }
}
