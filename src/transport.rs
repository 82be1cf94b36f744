//! HTTP transport seam.
//!
//! The core builds [`ApiRequest`]s and interprets [`ApiResponse`]s; moving bytes
//! is delegated to a [`MomoTransport`]. Non-2xx answers are returned as
//! responses, only connection-level failures are errors.

use crate::error::{MomoError, MomoResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub const REFERENCE_ID_HEADER: &str = "X-Reference-Id";
pub const TARGET_ENVIRONMENT_HEADER: &str = "X-Target-Environment";
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
pub const CALLBACK_URL_HEADER: &str = "X-Callback-Url";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Operation name used in errors and logs.
    pub operation: String,
    pub method: HttpMethod,
    /// Path relative to the configured host, starting with `/`.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<JsonValue>,
}

impl ApiRequest {
    pub fn new(operation: impl Into<String>, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(operation, HttpMethod::Get, path)
    }

    pub fn post(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(operation, HttpMethod::Post, path)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer_auth(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {}", token))
    }

    pub fn basic_auth(self, user: &str, password: &str) -> Self {
        let encoded = BASE64.encode(format!("{}:{}", user, password));
        self.header("Authorization", format!("Basic {}", encoded))
    }

    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

/// Error payload the provider attaches to most 4xx/5xx answers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self, operation: &str) -> MomoResult<T> {
        serde_json::from_str::<T>(&self.body).map_err(|e| {
            MomoError::decode(operation, format!("invalid provider JSON response: {}", e))
        })
    }

    pub fn provider_error(&self) -> ProviderErrorBody {
        serde_json::from_str(&self.body).unwrap_or_default()
    }

    fn error_message(&self, body: &ProviderErrorBody) -> String {
        body.message.clone().unwrap_or_else(|| {
            if self.body.trim().is_empty() {
                format!("HTTP {}", self.status)
            } else {
                format!("HTTP {}: {}", self.status, self.body.trim())
            }
        })
    }

    pub fn auth_error(&self, operation: &str) -> MomoError {
        let body = self.provider_error();
        MomoError::Auth {
            operation: operation.to_string(),
            status: Some(self.status),
            message: self.error_message(&body),
            code: body.code,
        }
    }

    pub fn payment_error(&self, operation: &str, reference_id: Option<Uuid>) -> MomoError {
        let body = self.provider_error();
        MomoError::Payment {
            operation: operation.to_string(),
            reference_id,
            status: self.status,
            message: self.error_message(&body),
            code: body.code,
        }
    }
}

#[async_trait]
pub trait MomoTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> MomoResult<ApiResponse>;
}

#[cfg(feature = "http")]
pub use self::http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use super::{ApiRequest, ApiResponse, HttpMethod, MomoTransport};
    use crate::config::MomoConfig;
    use crate::error::{MomoError, MomoResult};
    use async_trait::async_trait;
    use reqwest::Client;
    use std::time::Duration;
    use tracing::debug;

    /// `reqwest`-backed transport bound to one host.
    #[derive(Clone)]
    pub struct HttpTransport {
        client: Client,
        base_url: String,
    }

    impl HttpTransport {
        pub fn new(base_url: impl Into<String>, timeout: Duration) -> MomoResult<Self> {
            let client = Client::builder()
                .timeout(timeout)
                .user_agent(concat!("momo-mtn/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| {
                    MomoError::config(format!("failed to initialize HTTP client: {}", e))
                })?;

            Ok(Self {
                client,
                base_url: base_url.into().trim_end_matches('/').to_string(),
            })
        }

        pub fn from_config(config: &MomoConfig) -> MomoResult<Self> {
            Self::new(config.host.clone(), config.request_timeout)
        }

        fn endpoint(&self, path: &str) -> String {
            format!("{}{}", self.base_url, path)
        }
    }

    #[async_trait]
    impl MomoTransport for HttpTransport {
        async fn send(&self, request: ApiRequest) -> MomoResult<ApiResponse> {
            let method = match request.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
            };
            let url = self.endpoint(&request.path);

            let mut builder = self.client.request(method, &url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(|e| MomoError::Transport {
                operation: request.operation.clone(),
                message: format!("request to {} failed: {}", request.path, e),
                timed_out: e.is_timeout(),
            })?;

            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| MomoError::Transport {
                operation: request.operation.clone(),
                message: format!("failed to read response body: {}", e),
                timed_out: e.is_timeout(),
            })?;

            debug!(
                operation = %request.operation,
                method = request.method.as_str(),
                path = %request.path,
                status,
                "provider responded"
            );
            Ok(ApiResponse { status, body })
        }
    }
}
