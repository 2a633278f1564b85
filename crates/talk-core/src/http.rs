//! JSON over HTTP
//!
//! Programs talk to the chat server through [`HttpClient`] so they can be
//! driven by a scripted client in tests.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Best-effort parsed body of a response
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Empty,
}

impl ResponseBody {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return ResponseBody::Empty;
        }
        match serde_json::from_str(raw) {
            Ok(value) => ResponseBody::Json(value),
            Err(_) => ResponseBody::Text(raw.to_string()),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => Value::String(text),
            ResponseBody::Empty => Value::Null,
        }
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("HTTP status {status}")]
    Status { status: u16, body: ResponseBody },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected response shape: {0}")]
    Decode(String),
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get_json(&self, url: &str, token: Option<&str>) -> Result<Value, HttpError>;

    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        token: Option<&str>,
    ) -> Result<Value, HttpError>;
}

/// Deserialize a successful response into the expected shape
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, HttpError> {
    serde_json::from_value(value).map_err(|e| HttpError::Decode(e.to_string()))
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    data: ApiErrorData,
}

#[derive(Deserialize)]
struct ApiErrorData {
    message: String,
    #[serde(default)]
    details: Vec<String>,
}

/// User-facing description of a non-2xx response
pub fn describe_status_error(status: u16, body: &ResponseBody) -> String {
    if status >= 500 {
        let data = body.clone().into_value();
        return format!("[{status}] An internal error occurred on the API\n\nData: {data}");
    }

    if status >= 400 {
        return match body {
            ResponseBody::Empty => format!(
                "[{status}] An unknown client error occurred. No response data is available"
            ),
            ResponseBody::Text(text) => {
                format!("[{status}] An unknown client error occurred.\n\nData: {text}")
            }
            ResponseBody::Json(value) => {
                match serde_json::from_value::<ApiErrorEnvelope>(value.clone()) {
                    Ok(envelope) => {
                        let base = format!("[{status}] {}", envelope.data.message);
                        if envelope.data.details.is_empty() {
                            base
                        } else {
                            let details: Vec<String> = envelope
                                .data
                                .details
                                .iter()
                                .map(|d| format!("- {d}"))
                                .collect();
                            format!("{base}\n\nDetails:\n\n{}", details.join("\n"))
                        }
                    }
                    Err(_) => {
                        format!("[{status}] An unknown client error occurred.\n\nData: {value}")
                    }
                }
            }
        };
    }

    format!("[{status}] An unexpected status was received")
}

/// reqwest-backed client
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, HttpError> {
        let response = request
            .send()
            .await
            .map_err(|e| HttpError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let raw = response.text().await.unwrap_or_else(|e| {
            tracing::warn!("Unreadable response body: {}", e);
            String::new()
        });
        let body = ResponseBody::parse(&raw);

        if status >= 400 {
            tracing::warn!(status, "HTTP request failed");
            return Err(HttpError::Status { status, body });
        }

        Ok(body.into_value())
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get_json(&self, url: &str, token: Option<&str>) -> Result<Value, HttpError> {
        tracing::debug!(url, "GET");
        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        self.send(request).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        token: Option<&str>,
    ) -> Result<Value, HttpError> {
        tracing::debug!(url, "POST");
        let mut request = self.client.post(url).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        self.send(request).await
    }
}
