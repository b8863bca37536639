//! # Waterius - water and energy meter account poller
//!
//! Periodically polls the Waterius account API, correlates sources,
//! channels, report histories and export documents into an immutable
//! [`Snapshot`], and renders that snapshot as entities for a home
//! automation host.
//!
//! ## Architecture
//!
//! - `api`: authenticated transport, endpoint map and paginated client
//! - `extract`: pure normalisation of loosely-typed JSON records
//! - `model`: Source, Channel, Export and Snapshot types
//! - `coordinator`: refresh pipeline, schedule and manual triggers
//! - `presentation`: entity mapping over the latest snapshot
//! - `web`: HTTP surface for entity states and triggers
//! - `config`: YAML configuration with validation
//! - `logging`: structured logging and tracing

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod extract;
pub mod logging;
pub mod model;
pub mod presentation;
#[cfg(feature = "web")]
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorHandle};
pub use error::{Result, WateriusError};
pub use model::Snapshot;
