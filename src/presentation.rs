//! Entity mapping for the host automation platform
//!
//! Entities never cache data: every state read goes through [`EntityContext`]
//! to the most recently published snapshot, so a failed cycle leaves entity
//! states stale-but-valid and a successful one updates all of them at once.
//! Cycle failures are reported through the coordinator's refresh state, not
//! through entity availability.

use crate::coordinator::CoordinatorHandle;
use crate::extract::{
    build_channel_attrs, compute_days_left, normalize_due_date, parse_due_datetime,
    parse_personal_account,
};
use crate::model::Snapshot;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;

pub const DOMAIN: &str = "waterius";
pub const DEVICE_MANUFACTURER: &str = "Waterius";
pub const DEVICE_MODEL: &str = "account.waterius.ru";

/// Display metadata for a metering data type code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataTypeInfo {
    pub name: &'static str,
    pub device_class: &'static str,
    pub unit: &'static str,
    pub state_class: &'static str,
}

/// Known metering data types
pub fn data_type_info(code: i64) -> Option<DataTypeInfo> {
    let (name, device_class, unit) = match code {
        0 => ("Cold water", "water", "m³"),
        1 => ("Hot water", "water", "m³"),
        6 => ("Electricity T2 (night)", "energy", "kWh"),
        7 => ("Electricity T1 (peak)", "energy", "kWh"),
        8 => ("Electricity T3 (half-peak)", "energy", "kWh"),
        _ => return None,
    };
    Some(DataTypeInfo {
        name,
        device_class,
        unit,
        state_class: "total_increasing",
    })
}

fn device_class_title(device_class: Option<&str>) -> &'static str {
    match device_class {
        Some("water") => "Water meters",
        Some("energy") => "Electricity meter",
        _ => "Device",
    }
}

/// Device grouping all entities of one source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub identifier: String,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
}

impl DeviceInfo {
    pub fn for_source(source_id: i64, group_device_class: Option<&str>) -> Self {
        Self {
            identifier: format!("source_{}", source_id),
            name: format!("Waterius • {}", device_class_title(group_device_class)),
            manufacturer: DEVICE_MANUFACTURER,
            model: DEVICE_MODEL,
        }
    }
}

/// Rendered state of one entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub unique_id: String,
    pub name: String,
    pub kind: &'static str,
    pub value: Value,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_category: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceInfo>,
    pub attributes: Map<String, Value>,
}

/// Shared link between an entity and the coordinator, embedded by every entity
#[derive(Clone)]
pub struct EntityContext {
    entry_id: String,
    coordinator: CoordinatorHandle,
}

impl EntityContext {
    pub fn new(entry_id: &str, coordinator: CoordinatorHandle) -> Self {
        Self {
            entry_id: entry_id.to_string(),
            coordinator,
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn coordinator(&self) -> &CoordinatorHandle {
        &self.coordinator
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.coordinator.snapshot()
    }

    /// Entities have something to show once any snapshot was published
    pub fn available(&self) -> bool {
        self.coordinator.snapshot().is_some()
    }

    fn unique_id(&self, suffix: &str) -> String {
        format!("{}_{}", self.entry_id, suffix)
    }

    fn base_state(&self, unique_id: String, name: String, kind: &'static str) -> EntityState {
        EntityState {
            unique_id,
            name,
            kind,
            value: Value::Null,
            available: self.available(),
            icon: None,
            unit: None,
            device_class: None,
            state_class: None,
            entity_category: None,
            device: None,
            attributes: Map::new(),
        }
    }
}

/// Something the host renders from the latest snapshot
pub trait Entity: Send + Sync {
    fn unique_id(&self) -> String;
    fn state(&self) -> EntityState;
}

/// Account-wide counts
pub struct SummarySensor {
    ctx: EntityContext,
}

impl SummarySensor {
    pub fn new(ctx: EntityContext) -> Self {
        Self { ctx }
    }
}

impl Entity for SummarySensor {
    fn unique_id(&self) -> String {
        self.ctx.unique_id("summary")
    }

    fn state(&self) -> EntityState {
        let mut state = self
            .ctx
            .base_state(self.unique_id(), "Summary".to_string(), "sensor");
        state.icon = Some("mdi:counter");
        if let Some(snapshot) = self.ctx.snapshot() {
            state.value = json!(snapshot.source_count());
            state.attributes.insert("sources_count".into(), json!(snapshot.source_count()));
            state.attributes.insert("channels_count".into(), json!(snapshot.channel_count()));
            state.attributes.insert("exports_count".into(), json!(snapshot.export_count()));
        }
        state
    }
}

/// One meter reading
pub struct ChannelSensor {
    ctx: EntityContext,
    source_id: i64,
    channel_id: i64,
    name: String,
    data_type: Option<DataTypeInfo>,
    device: DeviceInfo,
}

impl ChannelSensor {
    pub fn new(
        ctx: EntityContext,
        snapshot: &Snapshot,
        source_id: i64,
        channel_id: i64,
        group_device_class: Option<&str>,
    ) -> Self {
        let channel = snapshot.channel(source_id, channel_id);
        let code = channel.and_then(|ch| ch.data_type());
        let data_type = code.and_then(data_type_info);
        let type_name = match (data_type, code) {
            (Some(info), _) => info.name.to_string(),
            (None, Some(code)) => format!("Data type {}", code),
            (None, None) => "Data type unknown".to_string(),
        };
        let name = match channel.and_then(|ch| ch.serial()) {
            Some(serial) => format!("{} ({})", type_name, serial),
            None => format!("{} (channel {})", type_name, channel_id),
        };
        Self {
            ctx,
            source_id,
            channel_id,
            name,
            data_type,
            device: DeviceInfo::for_source(source_id, group_device_class),
        }
    }
}

impl Entity for ChannelSensor {
    fn unique_id(&self) -> String {
        self.ctx.unique_id(&format!(
            "source_{}_channel_{}",
            self.source_id, self.channel_id
        ))
    }

    fn state(&self) -> EntityState {
        let mut state = self
            .ctx
            .base_state(self.unique_id(), self.name.clone(), "sensor");
        state.icon = Some("mdi:counter");
        state.device = Some(self.device.clone());
        if let Some(info) = self.data_type {
            state.unit = Some(info.unit);
            state.device_class = Some(info.device_class);
            state.state_class = Some(info.state_class);
        }
        let snapshot = self.ctx.snapshot();
        if let Some(channel) = snapshot
            .as_deref()
            .and_then(|s| s.channel(self.source_id, self.channel_id))
        {
            state.value = channel.last_value.clone();
            state.attributes = build_channel_attrs(&channel.raw, &channel.uk_values);
        }
        state
    }
}

/// Payment due date of an export document
pub struct ExportDueDateSensor {
    ctx: EntityContext,
    source_id: i64,
    source_name: String,
    export_id: i64,
    device: DeviceInfo,
}

impl ExportDueDateSensor {
    pub fn new(
        ctx: EntityContext,
        source_id: i64,
        source_name: &str,
        export_id: i64,
        group_device_class: Option<&str>,
    ) -> Self {
        let source_name = match source_name.trim() {
            "" => format!("Source {}", source_id),
            name => name.to_string(),
        };
        Self {
            ctx,
            source_id,
            source_name,
            export_id,
            device: DeviceInfo::for_source(source_id, group_device_class),
        }
    }

    fn due_raw(raw: &Map<String, Value>) -> String {
        raw.get("tarif_ended")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string()
    }
}

impl Entity for ExportDueDateSensor {
    fn unique_id(&self) -> String {
        self.ctx.unique_id(&format!(
            "source_{}_export_{}_diag",
            self.source_id, self.export_id
        ))
    }

    fn state(&self) -> EntityState {
        let mut state = self
            .ctx
            .base_state(self.unique_id(), "Payment due date".to_string(), "sensor");
        state.icon = Some("mdi:calendar");
        state.device_class = Some("timestamp");
        state.entity_category = Some("diagnostic");
        state.device = Some(self.device.clone());

        let snapshot = self.ctx.snapshot();
        let empty = Map::new();
        let raw = snapshot
            .as_deref()
            .and_then(|s| s.export(self.source_id, self.export_id))
            .map(|e| &e.raw)
            .unwrap_or(&empty);

        let due = Self::due_raw(raw);
        state.value = parse_due_datetime(&normalize_due_date(&due))
            .map(|dt| json!(dt.to_rfc3339()))
            .unwrap_or(Value::Null);

        let field = |key: &str| raw.get(key).cloned().unwrap_or(Value::Null);
        let attrs = &mut state.attributes;
        attrs.insert("device_name".into(), json!(self.source_name));
        attrs.insert("management_company".into(), field("title2"));
        attrs.insert(
            "personal_account".into(),
            json!(parse_personal_account(raw.get("title4"))),
        );
        attrs.insert("send_date".into(), field("send_date_description"));
        attrs.insert("user_contact".into(), field("user_contact"));
        attrs.insert(
            "days_until_payment".into(),
            compute_days_left(&due).map_or(Value::Null, |d| json!(d)),
        );
        state
    }
}

/// Manual refresh trigger
pub struct UpdateNowButton {
    ctx: EntityContext,
}

impl UpdateNowButton {
    pub fn new(ctx: EntityContext) -> Self {
        Self { ctx }
    }

    /// Queue a refresh; the coordinator coalesces repeated presses
    pub fn press(&self) -> crate::error::Result<()> {
        self.ctx.coordinator().request_refresh()
    }
}

impl Entity for UpdateNowButton {
    fn unique_id(&self) -> String {
        self.ctx.unique_id("update_now")
    }

    fn state(&self) -> EntityState {
        let mut state = self
            .ctx
            .base_state(self.unique_id(), "Update now".to_string(), "button");
        state.icon = Some("mdi:refresh");
        state.available = true;
        state
    }
}

/// Device class shared by a source's entities: that of its first known meter type
pub fn group_device_class(snapshot: &Snapshot, source_id: i64) -> Option<&'static str> {
    snapshot
        .channels(source_id)
        .iter()
        .find_map(|ch| ch.data_type().and_then(data_type_info))
        .map(|info| info.device_class)
}

/// Entities registered for one account entry, built from the first snapshot
pub struct EntityRegistry {
    pub summary: SummarySensor,
    pub channels: Vec<ChannelSensor>,
    pub exports: Vec<ExportDueDateSensor>,
    pub update_button: UpdateNowButton,
}

impl EntityRegistry {
    pub fn build(ctx: &EntityContext, snapshot: &Snapshot) -> Self {
        let mut channels = Vec::new();
        let mut exports = Vec::new();

        for (source_id, source_name) in &snapshot.sources {
            let group = group_device_class(snapshot, *source_id);
            for channel in snapshot.channels(*source_id) {
                channels.push(ChannelSensor::new(
                    ctx.clone(),
                    snapshot,
                    *source_id,
                    channel.channel_id,
                    group,
                ));
            }
            if let Some(source_exports) = snapshot.exports_by_source.get(source_id) {
                // BTreeMap keys are already sorted
                for export_id in source_exports.keys() {
                    exports.push(ExportDueDateSensor::new(
                        ctx.clone(),
                        *source_id,
                        source_name,
                        *export_id,
                        group,
                    ));
                }
            }
        }

        Self {
            summary: SummarySensor::new(ctx.clone()),
            channels,
            exports,
            update_button: UpdateNowButton::new(ctx.clone()),
        }
    }

    /// All entities in registration order
    pub fn entities(&self) -> Vec<&dyn Entity> {
        let mut all: Vec<&dyn Entity> = vec![&self.summary];
        all.extend(self.channels.iter().map(|e| e as &dyn Entity));
        all.extend(self.exports.iter().map(|e| e as &dyn Entity));
        all.push(&self.update_button);
        all
    }

    pub fn states(&self) -> Vec<EntityState> {
        self.entities().iter().map(|e| e.state()).collect()
    }

    pub fn find(&self, unique_id: &str) -> Option<&dyn Entity> {
        self.entities()
            .into_iter()
            .find(|e| e.unique_id() == unique_id)
    }
}
