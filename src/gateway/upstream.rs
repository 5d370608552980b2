use crate::types::{AppError, Result};
use crate::utils::toml_config::UpstreamConfig;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reqwest::{header, Client as ReqwestClient, Method, RequestBuilder};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Status and JSON body of a successful upstream call, relayed verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Outbound client for the order/training service.
#[derive(Clone)]
pub struct UpstreamClient {
    http: ReqwestClient,
    base_url: String,
}

impl UpstreamClient {
    /// Creates a client for `base_url`. Without a `timeout` calls wait on the transport.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = ReqwestClient::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self> {
        Self::new(
            &config.base_url,
            config.timeout_secs.map(Duration::from_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET path`, forwarding `authorization` when given.
    pub async fn get(&self, path: &str, authorization: Option<&str>) -> Result<UpstreamResponse> {
        self.send(self.request(Method::GET, path, authorization)).await
    }

    /// `POST path` with a JSON body, forwarding `authorization` when given.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        authorization: Option<&str>,
    ) -> Result<UpstreamResponse> {
        self.send(self.request(Method::POST, path, authorization).json(body))
            .await
    }

    fn request(&self, method: Method, path: &str, authorization: Option<&str>) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!(%method, %url, "forwarding to upstream");

        let mut builder = self
            .http
            .request(method, url)
            .header(header::ACCEPT, "application/json");
        if let Some(authorization) = authorization {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> Result<UpstreamResponse> {
        let resp = builder
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;

        let status = StatusCode::from_u16(resp.status().as_u16())
            .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;
        let raw = resp
            .bytes()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;

        // Empty or non-JSON bodies are treated as an empty object
        let body = serde_json::from_slice::<Value>(&raw).unwrap_or_else(|_| Value::Object(Map::new()));

        if status.is_success() {
            return Ok(UpstreamResponse { status, body });
        }

        classify_failure(status, body)
    }
}

/// Maps a non-2xx upstream answer onto the client-facing error.
///
/// A body carrying a string `error` is an application error and keeps its
/// status, message and `details`; other fields of the body are dropped.
/// Anything else is reported as unavailability.
fn classify_failure(status: StatusCode, body: Value) -> Result<UpstreamResponse> {
    let message = body
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string);

    match message {
        Some(message) if status.is_client_error() || status.is_server_error() => {
            warn!(status = status.as_u16(), %message, "upstream rejected request");
            Err(AppError::Upstream {
                status,
                message,
                details: body.get("details").cloned(),
            })
        }
        _ => Err(AppError::UpstreamUnavailable(format!(
            "unexpected upstream status {}",
            status
        ))),
    }
}
