#![allow(dead_code)]

use reqwest::Method;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use waterius::api::{ApiResponse, Endpoints, Transport, WateriusApi};
use waterius::error::{Result, WateriusError};

pub const BASE: &str = "http://mock.test";

#[derive(Clone)]
enum Reply {
    Ok(ApiResponse),
    Status(u16, String),
}

#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

/// In-memory transport keyed by absolute URL
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), Reply>>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_get(&self, url: &str, body: Value) {
        self.routes.lock().unwrap().insert(
            (Method::GET, url.to_string()),
            Reply::Ok(ApiResponse::Json(body)),
        );
    }

    pub fn on_get_response(&self, url: &str, response: ApiResponse) {
        self.routes
            .lock()
            .unwrap()
            .insert((Method::GET, url.to_string()), Reply::Ok(response));
    }

    pub fn on_post(&self, url: &str, response: ApiResponse) {
        self.routes
            .lock()
            .unwrap()
            .insert((Method::POST, url.to_string()), Reply::Ok(response));
    }

    pub fn fail_get(&self, url: &str, status: u16, body: &str) {
        self.routes.lock().unwrap().insert(
            (Method::GET, url.to_string()),
            Reply::Status(status, body.to_string()),
        );
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.url == url)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        _params: &[(&str, &str)],
        body: Option<&Value>,
        _timeout: Duration,
    ) -> Result<ApiResponse> {
        self.calls.lock().unwrap().push(Call {
            method: method.clone(),
            url: url.to_string(),
            body: body.cloned(),
        });
        let reply = self
            .routes
            .lock()
            .unwrap()
            .get(&(method, url.to_string()))
            .cloned();
        match reply {
            Some(Reply::Ok(resp)) => Ok(resp),
            Some(Reply::Status(status, body)) => Err(WateriusError::http_status(
                status,
                format!("HTTP {} for {}. Body: {}", status, url, body),
            )),
            None => Err(WateriusError::http_status(
                404,
                format!("HTTP 404 for {}. Body: ", url),
            )),
        }
    }
}

pub fn endpoints() -> Endpoints {
    Endpoints::new(BASE)
}

pub fn api(mock: &Arc<MockTransport>) -> WateriusApi {
    WateriusApi::new(mock.clone(), endpoints(), Duration::from_secs(30))
}

/// Two sources sharing export 100, one empty source, and some malformed channels
pub fn seed_account(mock: &MockTransport) {
    let e = endpoints();
    mock.on_get(
        &e.sources(),
        json!({
            "results": [
                {"id": 1, "name": "Flat"},
                {"id": "2", "name": "Dacha"},
                {"id": 3, "name": "Garage"},
                {"id": "bad", "name": "Broken"},
            ],
            "next": null
        }),
    );
    mock.on_get(
        &e.channels(),
        json!([
            {"id": 10, "source": 1, "export": 100, "last_value": 12.5, "data_type": 0, "serial": "A1"},
            {"id": 11, "source": "1", "export": " 200 ", "value": 3.25, "data_type": 1},
            {"id": 20, "source": 2, "export": "100", "last": 999.0, "data_type": 6},
            {"id": 30, "export": 300, "last_value": 1},
            {"id": 31, "source": "abc", "last_value": 1},
            {"id": null, "source": 1},
            "not an object"
        ]),
    );
    mock.on_get(
        &e.channel_reports(10),
        json!({
            "results": [
                {"status_text": "error at management company", "timestamp": "T0"},
                {"status_text": "sent", "uk_read_value": 10, "uk_send_value": 12, "timestamp": "T1"}
            ],
            "next": ""
        }),
    );
    mock.on_get(
        &e.channel_reports(11),
        json!([{"status_text": "pending", "timestamp": "T5"}]),
    );
    mock.on_get(&e.channel_reports(20), json!([]));
    mock.on_get(
        &e.export_detail(100),
        json!({
            "tarif_ended": "2024-03-15",
            "title2": "UK Solnechny",
            "title4": "Personal account: 0042",
            "send_date_description": "from 20 to 25",
            "user_contact": "+7 900 000-00-00"
        }),
    );
    mock.on_get(&e.export_detail(200), json!(["unexpected", "list"]));
}
