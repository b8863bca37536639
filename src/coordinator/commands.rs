use crate::api::WateriusApi;
use crate::error::Result;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::oneshot;

/// Requests accepted by the coordinator loop from entities and the web surface
pub enum CoordinatorCommand {
    /// Run a refresh cycle now; queued requests are coalesced
    Refresh,
    /// Submit one manual reading, then refresh
    SendReading {
        channel_id: i64,
        value: Value,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Submit the current reading of every channel, then refresh
    SendAll {
        reply: oneshot::Sender<Result<usize>>,
    },
    /// Swap the API client and schedule after an options change, then refresh
    Reconfigure {
        api: WateriusApi,
        update_interval: Duration,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Stop the loop
    Shutdown,
}
