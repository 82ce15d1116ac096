use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use tripmate_core::{CoreError, CoreResult};
use tripmate_shared::Masked;

use crate::app_config::ApiConfig;

/// Error body the backend attaches to every non-2xx response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub field_errors: Vec<FieldError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldError {
    pub field: String,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub reason: String,
}

impl ErrorResponse {
    fn describe(&self) -> String {
        if self.field_errors.is_empty() {
            return self.message.clone();
        }
        let fields: Vec<String> = self
            .field_errors
            .iter()
            .map(|f| format!("{}: {}", f.field, f.reason))
            .collect();
        format!("{} ({})", self.message, fields.join(", "))
    }
}

/// Thin JSON client over the trip backend's REST API
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<Masked<String>>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, token: Option<Masked<String>>) -> CoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn from_config(config: &ApiConfig) -> CoreResult<Self> {
        Self::new(&config.base_url, config.timeout(), config.access_token.clone())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose()),
            None => builder,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> CoreResult<T> {
        let response = send(self.request(Method::GET, path).query(query)).await?;
        decode(response).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> CoreResult<T> {
        let response = send(self.request(Method::POST, path).json(body)).await?;
        decode(response).await
    }

    /// POST whose response body carries nothing of interest.
    pub async fn post_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> CoreResult<()> {
        send(self.request(Method::POST, path).json(body)).await?;
        Ok(())
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> CoreResult<T> {
        let response = send(self.request(Method::PUT, path).json(body)).await?;
        decode(response).await
    }

    pub async fn put_unit<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> CoreResult<()> {
        send(self.request(Method::PUT, path).json(body)).await?;
        Ok(())
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> CoreResult<T> {
        let response = send(self.request(Method::PATCH, path).json(body)).await?;
        decode(response).await
    }

    pub async fn delete(&self, path: &str) -> CoreResult<()> {
        send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }
}

async fn send(builder: RequestBuilder) -> CoreResult<Response> {
    let response = builder
        .send()
        .await
        .map_err(|e| CoreError::Transport(e.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.describe())
        .unwrap_or_else(|_| body.trim().to_string());
    Err(map_status(status, message))
}

async fn decode<T: DeserializeOwned>(response: Response) -> CoreResult<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| CoreError::Transport(e.to_string()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub(crate) fn map_status(status: StatusCode, message: String) -> CoreError {
    match status {
        StatusCode::BAD_REQUEST => CoreError::Validation(message),
        StatusCode::NOT_FOUND => CoreError::NotFound(message),
        other => CoreError::Server {
            status: other.as_u16(),
            message,
        },
    }
}
