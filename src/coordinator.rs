//! Refresh coordinator
//!
//! Owns the account API client, runs refresh cycles on a fixed interval or on
//! demand, and publishes the latest [`Snapshot`] to any number of readers
//! through a `watch` channel. Only one cycle is ever in flight: the loop is a
//! single task and processes triggers sequentially.

use crate::api::WateriusApi;
use crate::error::{Result, WateriusError};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::model::Snapshot;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Duration, Instant, MissedTickBehavior, interval_at};

mod commands;
pub mod pipeline;

pub use commands::CoordinatorCommand;
pub use pipeline::build_snapshot;

/// What readers see of the refresh loop
#[derive(Debug, Clone, Default)]
pub struct RefreshState {
    /// Last successfully built snapshot; kept across failed cycles
    pub snapshot: Option<Arc<Snapshot>>,
    /// Whether the most recent cycle succeeded
    pub last_update_success: bool,
    /// Message of the most recent failure, cleared on success
    pub last_error: Option<String>,
    /// When the most recent cycle started
    pub last_attempt: Option<DateTime<Utc>>,
}

/// Cloneable access to the coordinator from entities and the web surface
#[derive(Clone)]
pub struct CoordinatorHandle {
    state_rx: watch::Receiver<RefreshState>,
    commands_tx: mpsc::UnboundedSender<CoordinatorCommand>,
}

impl CoordinatorHandle {
    /// Current refresh state
    pub fn state(&self) -> RefreshState {
        self.state_rx.borrow().clone()
    }

    /// Most recently published snapshot
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.state_rx.borrow().snapshot.clone()
    }

    /// Whether the last cycle succeeded
    pub fn last_update_success(&self) -> bool {
        self.state_rx.borrow().last_update_success
    }

    /// Receiver notified after every cycle
    pub fn subscribe(&self) -> watch::Receiver<RefreshState> {
        self.state_rx.clone()
    }

    fn send(&self, cmd: CoordinatorCommand) -> Result<()> {
        self.commands_tx
            .send(cmd)
            .map_err(|_| WateriusError::update_failed("Coordinator is not running"))
    }

    /// Queue a manual refresh
    pub fn request_refresh(&self) -> Result<()> {
        self.send(CoordinatorCommand::Refresh)
    }

    /// Submit a reading and wait for the API to accept it
    pub async fn send_reading(&self, channel_id: i64, value: Value) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::SendReading {
            channel_id,
            value,
            reply,
        })?;
        rx.await
            .map_err(|_| WateriusError::update_failed("Coordinator dropped the request"))?
    }

    /// Submit every channel's current reading; returns how many were sent
    pub async fn send_all(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::SendAll { reply })?;
        rx.await
            .map_err(|_| WateriusError::update_failed("Coordinator dropped the request"))?
    }

    /// Replace the API client and refresh interval of the running loop.
    ///
    /// Resolves once the loop has switched over; the refresh that follows
    /// runs with the new client.
    pub async fn reconfigure(&self, api: WateriusApi, update_interval: Duration) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(CoordinatorCommand::Reconfigure {
            api,
            update_interval,
            reply,
        })?;
        rx.await
            .map_err(|_| WateriusError::update_failed("Coordinator dropped the request"))?
    }

    /// Ask the loop to stop after the current command
    pub fn shutdown(&self) -> Result<()> {
        self.send(CoordinatorCommand::Shutdown)
    }
}

/// Refresh loop for one account entry
pub struct Coordinator {
    api: WateriusApi,
    update_interval: Duration,
    logger: StructuredLogger,
    state_tx: watch::Sender<RefreshState>,
    state_rx: watch::Receiver<RefreshState>,
    commands_tx: mpsc::UnboundedSender<CoordinatorCommand>,
    commands_rx: Option<mpsc::UnboundedReceiver<CoordinatorCommand>>,
}

impl Coordinator {
    pub fn new(api: WateriusApi, update_interval: Duration, entry_id: &str) -> Self {
        let (state_tx, state_rx) = watch::channel(RefreshState::default());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let logger = get_logger_with_context(
            LogContext::new("coordinator").with_entry_id(entry_id.to_string()),
        );
        Self {
            api,
            update_interval,
            logger,
            state_tx,
            state_rx,
            commands_tx,
            commands_rx: Some(commands_rx),
        }
    }

    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            state_rx: self.state_rx.clone(),
            commands_tx: self.commands_tx.clone(),
        }
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Run one cycle and publish its outcome.
    ///
    /// On failure the previously published snapshot stays in place and the
    /// error is returned as [`WateriusError::UpdateFailed`].
    pub async fn refresh(&mut self) -> Result<Arc<Snapshot>> {
        let started = std::time::Instant::now();
        let attempt = Utc::now();
        self.logger.debug("Refresh cycle started");

        match build_snapshot(&self.api, &self.logger).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.logger.info(&format!(
                    "Refresh finished in {} ms: {} sources, {} channels, {} exports",
                    started.elapsed().as_millis(),
                    snapshot.source_count(),
                    snapshot.channel_count(),
                    snapshot.export_count()
                ));
                let published = snapshot.clone();
                self.state_tx.send_modify(|state| {
                    state.snapshot = Some(published);
                    state.last_update_success = true;
                    state.last_error = None;
                    state.last_attempt = Some(attempt);
                });
                Ok(snapshot)
            }
            Err(e) => {
                let err = pipeline::update_failed(e);
                self.logger.error(&format!("Refresh failed: {}", err));
                let message = err.to_string();
                self.state_tx.send_modify(|state| {
                    state.last_update_success = false;
                    state.last_error = Some(message);
                    state.last_attempt = Some(attempt);
                });
                Err(err)
            }
        }
    }

    /// Initial refresh before the schedule starts; failure means "not ready"
    pub async fn first_refresh(&mut self) -> Result<Arc<Snapshot>> {
        self.refresh().await
    }

    /// Submit every non-null channel reading, continuing past rejections.
    ///
    /// Returns how many were attempted, how many were accepted and the first
    /// rejection.
    async fn send_all_current(&self) -> (usize, usize, Option<WateriusError>) {
        let Some(snapshot) = self.state_rx.borrow().snapshot.clone() else {
            return (0, 0, None);
        };
        let mut attempted = 0;
        let mut sent = 0;
        let mut first_error = None;
        for channel in snapshot.channels_by_source.values().flatten() {
            if channel.last_value.is_null() {
                continue;
            }
            attempted += 1;
            match self
                .api
                .send_reading(channel.channel_id, &channel.last_value)
                .await
            {
                Ok(_) => sent += 1,
                Err(e) => {
                    self.logger
                        .with_field("channel_id", channel.channel_id)
                        .warn(&format!("Reading rejected: {}", e));
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        (attempted, sent, first_error)
    }

    /// Execute one command; returns whether a refresh should follow
    async fn handle_command(&mut self, cmd: CoordinatorCommand) -> bool {
        match cmd {
            CoordinatorCommand::Refresh => true,
            CoordinatorCommand::SendReading {
                channel_id,
                value,
                reply,
            } => {
                let result = self
                    .api
                    .send_reading(channel_id, &value)
                    .await
                    .map(|_| ());
                if let Err(e) = &result {
                    self.logger
                        .error(&format!("Reading for channel {} rejected: {}", channel_id, e));
                }
                let ok = result.is_ok();
                let _ = reply.send(result);
                ok
            }
            CoordinatorCommand::SendAll { reply } => {
                let (attempted, sent, failure) = self.send_all_current().await;
                let result = match failure {
                    None => Ok(sent),
                    Some(e) => {
                        let err = WateriusError::Api {
                            status: e.status(),
                            message: format!(
                                "{} of {} readings submitted; first rejection: {}",
                                sent, attempted, e
                            ),
                        };
                        self.logger.error(&format!("Bulk submission incomplete: {}", err));
                        Err(err)
                    }
                };
                let _ = reply.send(result);
                // Accepted readings are worth a refresh even if others failed
                sent > 0
            }
            CoordinatorCommand::Reconfigure {
                api,
                update_interval,
                reply,
            } => {
                self.api = api;
                self.update_interval = update_interval;
                self.logger.info(&format!(
                    "Options applied, interval {} s",
                    update_interval.as_secs()
                ));
                let _ = reply.send(Ok(()));
                true
            }
            CoordinatorCommand::Shutdown => false,
        }
    }

    /// Scheduled loop. The first tick fires one interval after start, since
    /// [`Coordinator::first_refresh`] is expected to have run already.
    pub async fn run(mut self) -> Result<()> {
        let mut commands_rx = self
            .commands_rx
            .take()
            .ok_or_else(|| WateriusError::config("Coordinator loop already started"))?;

        let mut period = self.update_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.logger.info(&format!(
            "Refresh loop started, interval {} s",
            period.as_secs()
        ));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failures are already published; the next tick retries.
                    let _ = self.refresh().await;
                }
                cmd = commands_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    if matches!(cmd, CoordinatorCommand::Shutdown) {
                        break;
                    }
                    let mut wants_refresh = self.handle_command(cmd).await;
                    let mut stop = false;
                    while let Ok(next) = commands_rx.try_recv() {
                        if matches!(next, CoordinatorCommand::Shutdown) {
                            stop = true;
                            break;
                        }
                        wants_refresh |= self.handle_command(next).await;
                    }
                    if self.update_interval != period {
                        period = self.update_interval;
                        ticker = interval_at(Instant::now() + period, period);
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    }
                    if wants_refresh {
                        let _ = self.refresh().await;
                        ticker.reset();
                    }
                    if stop {
                        break;
                    }
                }
            }
        }

        self.logger.info("Refresh loop stopped");
        Ok(())
    }
}
