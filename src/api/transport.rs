use crate::error::{Result, WateriusError};
use crate::logging::{StructuredLogger, get_logger};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Authorization scheme expected by the account API
pub const AUTH_SCHEME: &str = "Token";

/// Longest response body excerpt carried inside an HTTP error
pub const ERROR_BODY_LIMIT: usize = 2000;

/// Decoded response of a single request
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// 204 No Content
    NoContent,
    /// Body served as `application/json`
    Json(Value),
    /// Any other body, returned verbatim
    Text(String),
}

impl ApiResponse {
    /// Short description of the payload shape, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ApiResponse::NoContent => "null",
            ApiResponse::Text(_) => "text",
            ApiResponse::Json(v) => match v {
                Value::Null => "null",
                Value::Bool(_) => "bool",
                Value::Number(_) => "number",
                Value::String(_) => "string",
                Value::Array(_) => "array",
                Value::Object(_) => "object",
            },
        }
    }

    /// Collapse into a JSON value (`null` for no content, a string for text)
    pub fn into_value(self) -> Value {
        match self {
            ApiResponse::NoContent => Value::Null,
            ApiResponse::Json(v) => v,
            ApiResponse::Text(s) => Value::String(s),
        }
    }
}

/// Issues one authenticated request against the account API
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<ApiResponse>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
    token: String,
    logger: StructuredLogger,
}

impl HttpTransport {
    pub fn new(token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| WateriusError::api(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            token: token.trim().to_string(),
            logger: get_logger("transport"),
        })
    }

    fn map_send_error(url: &str, err: &reqwest::Error) -> WateriusError {
        if err.is_timeout() {
            WateriusError::api(format!("Timeout calling {}", url))
        } else {
            WateriusError::api(format!("Network error calling {}: {}", url, err))
        }
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<ApiResponse> {
        self.logger.trace(&format!("{} {}", method, url));

        let mut builder = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, format!("{} {}", AUTH_SCHEME, self.token))
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, concat!("waterius/", env!("APP_VERSION")))
            .timeout(timeout);
        if !params.is_empty() {
            builder = builder.query(params);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| Self::map_send_error(url, &e))?;
        let status = resp.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(ApiResponse::NoContent);
        }

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(WateriusError::http_status(
                status.as_u16(),
                format!("HTTP {} for {}. Body: {}", status.as_u16(), url, excerpt),
            ));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        let text = resp
            .text()
            .await
            .map_err(|e| Self::map_send_error(url, &e))?;

        if content_type.contains("application/json") {
            let value = serde_json::from_str(&text).map_err(|e| {
                WateriusError::api(format!("Invalid JSON body from {}: {}", url, e))
            })?;
            Ok(ApiResponse::Json(value))
        } else {
            Ok(ApiResponse::Text(text))
        }
    }
}
