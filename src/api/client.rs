use crate::api::endpoints::Endpoints;
use crate::api::transport::{ApiResponse, Transport};
use crate::error::{Result, WateriusError};
use crate::logging::{StructuredLogger, get_logger};
use reqwest::Method;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;

/// Typed client for the account API
#[derive(Clone)]
pub struct WateriusApi {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    timeout: Duration,
    logger: StructuredLogger,
}

fn keep_objects(items: Vec<Value>) -> impl Iterator<Item = Map<String, Value>> {
    items.into_iter().filter_map(|item| match item {
        Value::Object(map) => Some(map),
        _ => None,
    })
}

impl WateriusApi {
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints, timeout: Duration) -> Self {
        Self {
            transport,
            endpoints,
            timeout,
            logger: get_logger("api"),
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn get(&self, url: &str) -> Result<ApiResponse> {
        self.transport
            .request(Method::GET, url, &[], None, self.timeout)
            .await
    }

    /// Collect every object record behind `url`.
    ///
    /// Follows the `{results, next}` envelope until `next` is empty. A plain
    /// array is a single page and ends the walk. Non-object entries are dropped;
    /// any other payload shape is an error.
    pub async fn get_paginated(&self, url: &str) -> Result<Vec<Map<String, Value>>> {
        let mut items = Vec::new();
        let mut next_url = Some(url.to_string());
        let mut pages = 0usize;

        while let Some(current) = next_url.take() {
            pages += 1;
            match self.get(&current).await? {
                ApiResponse::Json(Value::Object(mut page)) if page.contains_key("results") => {
                    if let Some(Value::Array(results)) = page.remove("results") {
                        items.extend(keep_objects(results));
                    }
                    next_url = match page.get("next") {
                        Some(Value::String(next)) if !next.is_empty() => Some(next.clone()),
                        _ => None,
                    };
                }
                ApiResponse::Json(Value::Array(list)) => {
                    items.extend(keep_objects(list));
                }
                other => {
                    return Err(WateriusError::unexpected_format(format!(
                        "Unexpected response format for {}: {}",
                        current,
                        other.type_name()
                    )));
                }
            }
        }

        self.logger.trace(&format!(
            "Fetched {} records from {} in {} page(s)",
            items.len(),
            url,
            pages
        ));
        Ok(items)
    }

    pub async fn fetch_sources(&self) -> Result<Vec<Map<String, Value>>> {
        self.get_paginated(&self.endpoints.sources()).await
    }

    pub async fn fetch_channels(&self) -> Result<Vec<Map<String, Value>>> {
        self.get_paginated(&self.endpoints.channels()).await
    }

    pub async fn fetch_channel_reports(&self, channel_id: i64) -> Result<Vec<Map<String, Value>>> {
        self.get_paginated(&self.endpoints.channel_reports(channel_id))
            .await
    }

    /// Export document detail, returned as whatever the endpoint served
    pub async fn fetch_export_detail(&self, export_id: i64) -> Result<ApiResponse> {
        self.get(&self.endpoints.export_detail(export_id)).await
    }

    /// Submit a manual reading for a channel
    pub async fn send_reading(&self, channel_id: i64, value: &Value) -> Result<ApiResponse> {
        let body = json!({ "value_obj": value });
        self.logger
            .info(&format!("Submitting reading for channel {}", channel_id));
        self.transport
            .request(
                Method::POST,
                &self.endpoints.channel_reports(channel_id),
                &[],
                Some(&body),
                self.timeout,
            )
            .await
    }
}
