mod common;

use common::{MockTransport, api, endpoints, seed_account};
use serde_json::{Value, json};
use std::time::Duration;
use waterius::Coordinator;
use waterius::presentation::{Entity, EntityContext, EntityRegistry};

const ENTRY: &str = "waterius_test";

async fn registry() -> (std::sync::Arc<MockTransport>, Coordinator, EntityRegistry) {
    let mock = MockTransport::new();
    seed_account(&mock);
    let mut coord = Coordinator::new(api(&mock), Duration::from_secs(3600), ENTRY);
    let snapshot = coord.first_refresh().await.unwrap();
    let ctx = EntityContext::new(ENTRY, coord.handle());
    let registry = EntityRegistry::build(&ctx, &snapshot);
    (mock, coord, registry)
}

#[tokio::test]
async fn registry_contains_one_entity_per_channel_and_export() {
    let (_mock, _coord, registry) = registry().await;

    assert_eq!(registry.channels.len(), 3);
    // Export 100 appears under both sources, export 200 only under source 1
    assert_eq!(registry.exports.len(), 3);

    let ids: Vec<String> = registry.entities().iter().map(|e| e.unique_id()).collect();
    assert_eq!(ids.first().unwrap(), "waterius_test_summary");
    assert_eq!(ids.last().unwrap(), "waterius_test_update_now");
    assert!(ids.contains(&"waterius_test_source_1_channel_10".to_string()));
    assert!(ids.contains(&"waterius_test_source_2_export_100_diag".to_string()));
}

#[tokio::test]
async fn summary_counts_snapshot() {
    let (_mock, _coord, registry) = registry().await;
    let state = registry.summary.state();
    assert_eq!(state.value, json!(3));
    assert_eq!(state.attributes["channels_count"], json!(3));
    assert_eq!(state.attributes["exports_count"], json!(3));
    assert!(state.available);
}

#[tokio::test]
async fn channel_sensor_state_and_attributes() {
    let (_mock, _coord, registry) = registry().await;
    let entity = registry.find("waterius_test_source_1_channel_10").unwrap();
    let state = entity.state();

    assert_eq!(state.name, "Cold water (A1)");
    assert_eq!(state.value, json!(12.5));
    assert_eq!(state.unit, Some("m³"));
    assert_eq!(state.state_class, Some("total_increasing"));
    assert_eq!(state.attributes["serial_number"], json!("A1"));
    assert_eq!(state.attributes["current_period_value"], json!(12));
    let device = state.device.unwrap();
    assert_eq!(device.identifier, "source_1");
    assert_eq!(device.name, "Waterius • Water meters");

    let power = registry.find("waterius_test_source_2_channel_20").unwrap().state();
    assert_eq!(power.unit, Some("kWh"));
    assert_eq!(power.name, "Electricity T2 (night) (channel 20)");
}

#[tokio::test]
async fn export_sensor_renders_due_date_and_account() {
    let (_mock, _coord, registry) = registry().await;
    let state = registry
        .find("waterius_test_source_1_export_100_diag")
        .unwrap()
        .state();

    assert_eq!(state.value, json!("2024-03-15T00:00:00+00:00"));
    assert_eq!(state.device_class, Some("timestamp"));
    assert_eq!(state.entity_category, Some("diagnostic"));
    assert_eq!(state.attributes["device_name"], json!("Flat"));
    assert_eq!(state.attributes["management_company"], json!("UK Solnechny"));
    assert_eq!(state.attributes["personal_account"], json!("0042"));
    assert_eq!(state.attributes["send_date"], json!("from 20 to 25"));
    assert!(state.attributes["days_until_payment"].is_i64());

    // Wrapped non-object detail has no due date
    let wrapped = registry
        .find("waterius_test_source_1_export_200_diag")
        .unwrap()
        .state();
    assert_eq!(wrapped.value, Value::Null);
    assert_eq!(wrapped.attributes["personal_account"], json!(""));
}

#[tokio::test]
async fn failed_refresh_keeps_entities_stale_but_valid() {
    let (mock, mut coord, registry) = registry().await;
    let before = registry.states();

    mock.fail_get(&endpoints().sources(), 503, "maintenance");
    assert!(coord.refresh().await.is_err());

    // Entity states are untouched; the failure lives in the refresh state
    assert_eq!(registry.states(), before);
    let state = registry.find("waterius_test_source_1_channel_10").unwrap().state();
    assert!(state.available);
    assert_eq!(state.value, json!(12.5));

    let refresh = coord.handle().state();
    assert!(!refresh.last_update_success);
    assert!(refresh.last_error.unwrap().contains("maintenance"));
}

#[tokio::test]
async fn entities_unavailable_before_any_snapshot() {
    let mock = MockTransport::new();
    let coord = Coordinator::new(api(&mock), Duration::from_secs(3600), ENTRY);
    let ctx = EntityContext::new(ENTRY, coord.handle());
    let registry = EntityRegistry::build(&ctx, &waterius::Snapshot::default());

    assert!(!registry.summary.state().available);
    assert_eq!(registry.summary.state().value, Value::Null);
    assert!(registry.update_button.state().available);
}

#[tokio::test]
async fn source_without_name_still_gets_entities() {
    let mock = MockTransport::new();
    let e = endpoints();
    mock.on_get(&e.sources(), json!([{"id": 5, "name": null}]));
    mock.on_get(&e.channels(), json!([{"id": 50, "source": 5, "export": 7, "last_value": 1}]));
    mock.on_get(&e.channel_reports(50), json!([]));
    mock.on_get(&e.export_detail(7), json!({"tarif_ended": "2024-03-15"}));

    let mut coord = Coordinator::new(api(&mock), Duration::from_secs(3600), ENTRY);
    let snapshot = coord.first_refresh().await.unwrap();
    assert_eq!(snapshot.sources[&5], "");

    let ctx = EntityContext::new(ENTRY, coord.handle());
    let registry = EntityRegistry::build(&ctx, &snapshot);
    assert_eq!(registry.channels.len(), 1);
    let export = registry
        .find("waterius_test_source_5_export_7_diag")
        .unwrap()
        .state();
    assert_eq!(export.attributes["device_name"], json!("Source 5"));
}

#[tokio::test]
async fn entities_follow_the_latest_snapshot() {
    let (mock, mut coord, registry) = registry().await;
    let e = endpoints();
    mock.on_get(
        &e.channels(),
        json!([{"id": 10, "source": 1, "export": 100, "last_value": 13.0, "data_type": 0, "serial": "A1"}]),
    );
    coord.refresh().await.unwrap();

    let state = registry.find("waterius_test_source_1_channel_10").unwrap().state();
    assert_eq!(state.value, json!(13.0));

    // Registered from the first snapshot; a vanished channel renders empty
    let gone = registry.find("waterius_test_source_2_channel_20").unwrap().state();
    assert_eq!(gone.value, Value::Null);
}

#[tokio::test]
async fn pressing_update_now_queues_a_refresh() {
    let (mock, coord, registry) = registry().await;
    let before = mock.calls_to(&endpoints().sources());
    let handle = coord.handle();
    let mut updates = handle.subscribe();

    registry.update_button.press().unwrap();
    let task = tokio::spawn(coord.run());
    tokio::time::timeout(Duration::from_secs(5), updates.changed())
        .await
        .unwrap()
        .unwrap();
    handle.shutdown().unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(mock.calls_to(&endpoints().sources()), before + 1);
}
