use crate::api::{ApiResponse, WateriusApi};
use crate::error::{Result, WateriusError};
use crate::extract::{
    coerce_record_id, extract_export_id, extract_last_value, extract_source, extract_source_id,
    extract_uk_period_values,
};
use crate::logging::StructuredLogger;
use crate::model::{Channel, Export, Snapshot, Source};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// `id -> name` for every well-formed source record
fn collect_sources(
    records: Vec<Map<String, Value>>,
    logger: &StructuredLogger,
) -> BTreeMap<i64, String> {
    records
        .iter()
        .filter_map(|record| {
            let source = extract_source(record);
            if source.is_none() {
                logger
                    .with_field("id", record.get("id").cloned().unwrap_or(Value::Null))
                    .debug("Skipping source record without a usable id or name");
            }
            source
        })
        .map(|Source { id, name }| (id, name))
        .collect()
}

fn export_raw(detail: ApiResponse) -> Map<String, Value> {
    match detail {
        ApiResponse::Json(Value::Object(map)) => map,
        other => {
            let mut wrapped = Map::new();
            wrapped.insert("raw".to_string(), other.into_value());
            wrapped
        }
    }
}

/// Run one full refresh cycle against the API.
///
/// Sources, then channels (each with its report history), then every
/// referenced export exactly once. Any request failure aborts the cycle;
/// malformed records are skipped.
pub async fn build_snapshot(api: &WateriusApi, logger: &StructuredLogger) -> Result<Snapshot> {
    let sources = collect_sources(api.fetch_sources().await?, logger);

    let mut channels_by_source: BTreeMap<i64, Vec<Channel>> = BTreeMap::new();
    let mut pending_exports: BTreeSet<i64> = BTreeSet::new();

    for raw in api.fetch_channels().await? {
        let Some(channel_id) = coerce_record_id(raw.get("id")) else {
            logger
                .with_field("id", raw.get("id").cloned().unwrap_or(Value::Null))
                .debug("Skipping channel record without a usable id");
            continue;
        };
        let Some(source_id) = extract_source_id(&raw) else {
            logger
                .with_field("channel_id", channel_id)
                .debug("Skipping channel without a source");
            continue;
        };

        let export_id = extract_export_id(&raw);
        if let Some(id) = export_id {
            pending_exports.insert(id);
        }

        let last_value = extract_last_value(&raw);
        let reports = api.fetch_channel_reports(channel_id).await?;
        let uk_values = extract_uk_period_values(&reports);

        channels_by_source
            .entry(source_id)
            .or_default()
            .push(Channel {
                channel_id,
                source_id,
                export_id,
                last_value,
                raw,
                uk_values,
            });
    }

    for source_id in sources.keys() {
        channels_by_source.entry(*source_id).or_default();
    }

    // BTreeSet iterates in ascending order
    let mut export_details: BTreeMap<i64, Map<String, Value>> = BTreeMap::new();
    for export_id in &pending_exports {
        let detail = api.fetch_export_detail(*export_id).await?;
        if !matches!(detail, ApiResponse::Json(Value::Object(_))) {
            logger
                .with_field("export_id", export_id)
                .warn(&format!("Export detail is {}, wrapping it", detail.type_name()));
        }
        export_details.insert(*export_id, export_raw(detail));
    }

    let mut exports_by_source: BTreeMap<i64, BTreeMap<i64, Export>> = BTreeMap::new();
    for (source_id, channels) in &channels_by_source {
        let referenced: BTreeSet<i64> = channels
            .iter()
            .filter_map(|ch| extract_export_id(&ch.raw))
            .collect();
        if referenced.is_empty() {
            continue;
        }
        let exports = referenced
            .into_iter()
            .map(|export_id| {
                let raw = export_details.get(&export_id).cloned().unwrap_or_default();
                (export_id, Export { export_id, raw })
            })
            .collect();
        exports_by_source.insert(*source_id, exports);
    }

    Ok(Snapshot {
        sources,
        channels_by_source,
        exports_by_source,
        refreshed_at: Utc::now(),
    })
}

/// Wrap a cycle error into the single update-failed signal
pub fn update_failed(err: WateriusError) -> WateriusError {
    match err {
        WateriusError::Api { message, .. } | WateriusError::UnexpectedFormat { message } => {
            WateriusError::update_failed(message)
        }
        err @ WateriusError::UpdateFailed { .. } => err,
        other => WateriusError::update_failed(other.to_string()),
    }
}
