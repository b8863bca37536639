//! Typed snapshot of one refresh cycle
//!
//! Every record keeps its original JSON object in `raw` so presentation can
//! pull secondary attributes without the pipeline knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One physical metering account/location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
}

/// Last reading pair confirmed as submitted to the management company
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UkValues {
    pub prev_period_value: Value,
    pub curr_period_value: Value,
    pub timestamp: Value,
}

/// One meter belonging to a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: i64,
    pub source_id: i64,
    pub export_id: Option<i64>,
    pub last_value: Value,
    pub raw: Map<String, Value>,
    pub uk_values: UkValues,
}

impl Channel {
    /// Metering data type code (cold water, hot water, tariff zones)
    pub fn data_type(&self) -> Option<i64> {
        self.raw.get("data_type").and_then(Value::as_i64)
    }

    /// Meter serial number as reported by the API
    pub fn serial(&self) -> Option<String> {
        match self.raw.get("serial") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// A billing/export document referenced by one or more channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Export {
    pub export_id: i64,
    pub raw: Map<String, Value>,
}

/// Complete, immutable result of one refresh cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub sources: BTreeMap<i64, String>,
    pub channels_by_source: BTreeMap<i64, Vec<Channel>>,
    pub exports_by_source: BTreeMap<i64, BTreeMap<i64, Export>>,
    pub refreshed_at: DateTime<Utc>,
}

impl Snapshot {
    /// Channels of a source; empty when the source is unknown
    pub fn channels(&self, source_id: i64) -> &[Channel] {
        self.channels_by_source
            .get(&source_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Find one channel under a source
    pub fn channel(&self, source_id: i64, channel_id: i64) -> Option<&Channel> {
        self.channels(source_id)
            .iter()
            .find(|ch| ch.channel_id == channel_id)
    }

    /// Find a channel by id regardless of its source
    pub fn find_channel(&self, channel_id: i64) -> Option<&Channel> {
        self.channels_by_source
            .values()
            .flatten()
            .find(|ch| ch.channel_id == channel_id)
    }

    /// Export detail referenced by a source's channels
    pub fn export(&self, source_id: i64, export_id: i64) -> Option<&Export> {
        self.exports_by_source
            .get(&source_id)
            .and_then(|m| m.get(&export_id))
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn channel_count(&self) -> usize {
        self.channels_by_source.values().map(Vec::len).sum()
    }

    pub fn export_count(&self) -> usize {
        self.exports_by_source.values().map(BTreeMap::len).sum()
    }
}
