//! End-to-end tests: plugin setup, attach, and the save pipeline.
//!
//! Run with: cargo test --test integration_tests

mod common;

use common::{Record, TestSchema};
use docseq::contracts::{AffixError, CounterStore, FieldKind, SequenceError};
use docseq::storage::{MemoryConnection, MemoryCounterStore, RocksDbConnection, RocksDbCounterStore};
use docseq::{Affix, SequenceOptions, SequencePlugin};
use serde_json::json;
use tempfile::TempDir;

fn memory_plugin() -> (SequencePlugin<MemoryCounterStore>, MemoryConnection) {
    let connection = MemoryConnection::new();
    let plugin = SequencePlugin::new();
    plugin.initialize(&connection).unwrap();
    (plugin, connection)
}

fn rocksdb_plugin() -> (SequencePlugin<RocksDbCounterStore>, RocksDbConnection, TempDir) {
    let dir = TempDir::new().unwrap();
    let connection = RocksDbConnection::open_path(dir.path()).unwrap();
    let plugin = SequencePlugin::new();
    plugin.initialize(&connection).unwrap();
    (plugin, connection, dir)
}

async fn save_new(schema: &TestSchema) -> Record {
    let mut record = Record::new();
    schema.save(&mut record).await.expect("save should succeed");
    record
}

// =============================================================================
// Rendering
// =============================================================================

#[tokio::test]
async fn literal_prefix_in_creation_order() {
    let (plugin, _conn) = memory_plugin();
    let mut schema = TestSchema::new();
    plugin
        .attach(
            &mut schema,
            SequenceOptions::new("Order").prefix("ORD-").start_at(100),
        )
        .unwrap();

    let mut values = Vec::new();
    for _ in 0..3 {
        values.push(save_new(&schema).await.str_field("no").unwrap().to_string());
    }
    assert_eq!(values, vec!["ORD-100", "ORD-101", "ORD-102"]);
}

#[tokio::test]
async fn literal_prefix_in_creation_order_rocksdb() {
    let (plugin, _conn, _dir) = rocksdb_plugin();
    let mut schema = TestSchema::new();
    plugin
        .attach(
            &mut schema,
            SequenceOptions::new("Order").prefix("ORD-").start_at(100),
        )
        .unwrap();

    let mut values = Vec::new();
    for _ in 0..3 {
        values.push(save_new(&schema).await.str_field("no").unwrap().to_string());
    }
    assert_eq!(values, vec!["ORD-100", "ORD-101", "ORD-102"]);
}

#[tokio::test]
async fn computed_prefix_uses_document_field() {
    let (plugin, _conn) = memory_plugin();
    let mut schema = TestSchema::new();
    let prefix = Affix::computed_async(|doc| {
        let region = doc.get_str("region").unwrap_or_default().to_string();
        async move { Ok::<_, AffixError>(region) }
    });
    plugin
        .attach(
            &mut schema,
            SequenceOptions::new("Shipment").prefix(prefix).start_at(5),
        )
        .unwrap();

    let mut record = Record::new().with("region", "EU");
    schema.save(&mut record).await.unwrap();
    assert_eq!(record.str_field("no"), Some("EU5"));
}

#[tokio::test]
async fn suffix_and_step() {
    let (plugin, _conn) = memory_plugin();
    let mut schema = TestSchema::new();
    plugin
        .attach(
            &mut schema,
            SequenceOptions::new("Invoice")
                .field("number")
                .start_at(10)
                .increment_by(10)
                .suffix(Affix::computed(|doc| {
                    format!("-{}", doc.get_str("year").unwrap_or("0000"))
                })),
        )
        .unwrap();

    let first = {
        let mut r = Record::new().with("year", "2024");
        schema.save(&mut r).await.unwrap();
        r
    };
    let second = save_new(&schema).await;
    assert_eq!(first.str_field("number"), Some("10-2024"));
    assert_eq!(second.str_field("number"), Some("20-0000"));
}

#[tokio::test]
async fn json_options_drive_the_rule() {
    let (plugin, _conn) = memory_plugin();
    let mut schema = TestSchema::new();
    let options = SequenceOptions::from_value(&json!({
        "model": "Ticket",
        "field": "ref",
        "startAt": 1,
        "incrementBy": 2,
        "prefix": "T",
        "suffix": "Z"
    }))
    .unwrap();
    plugin.attach(&mut schema, options).unwrap();

    assert_eq!(save_new(&schema).await.str_field("ref"), Some("T1Z"));
    assert_eq!(save_new(&schema).await.str_field("ref"), Some("T3Z"));
}

// =============================================================================
// Schema declaration and counter identity
// =============================================================================

#[tokio::test]
async fn attach_declares_one_string_field() {
    let (plugin, _conn) = memory_plugin();
    let mut schema = TestSchema::new();
    plugin
        .attach(&mut schema, SequenceOptions::new("Order").field("number"))
        .unwrap();

    assert_eq!(schema.fields, vec![("number".to_string(), FieldKind::String)]);
    assert_eq!(schema.hook_count(), 1);
}

#[tokio::test]
async fn two_fields_on_one_model_use_separate_counters() {
    let (plugin, _conn) = memory_plugin();
    let mut schema = TestSchema::new();
    plugin
        .attach(&mut schema, SequenceOptions::new("Order").field("a"))
        .unwrap();
    plugin
        .attach(
            &mut schema,
            SequenceOptions::new("Order").field("b").start_at(1000),
        )
        .unwrap();

    save_new(&schema).await;
    let record = save_new(&schema).await;
    assert_eq!(record.str_field("a"), Some("1"));
    assert_eq!(record.str_field("b"), Some("1001"));
}

#[tokio::test]
async fn schemas_sharing_a_model_share_its_counter() {
    let (plugin, _conn) = memory_plugin();
    let mut orders = TestSchema::new();
    let mut archived = TestSchema::new();
    plugin
        .attach(&mut orders, SequenceOptions::new("Order"))
        .unwrap();
    plugin
        .attach(&mut archived, SequenceOptions::new("Order"))
        .unwrap();

    assert_eq!(save_new(&orders).await.str_field("no"), Some("0"));
    assert_eq!(save_new(&archived).await.str_field("no"), Some("1"));
}

#[tokio::test]
async fn separate_connections_keep_separate_counters() {
    let (first, _c1) = memory_plugin();
    let (second, _c2) = memory_plugin();
    let mut a = TestSchema::new();
    let mut b = TestSchema::new();
    first.attach(&mut a, SequenceOptions::new("Order")).unwrap();
    second.attach(&mut b, SequenceOptions::new("Order")).unwrap();

    save_new(&a).await;
    save_new(&a).await;
    assert_eq!(save_new(&b).await.str_field("no"), Some("0"));
}

// =============================================================================
// Update exclusion
// =============================================================================

#[tokio::test]
async fn resaving_never_changes_the_sequence_field() {
    let (plugin, connection) = memory_plugin();
    let mut schema = TestSchema::new();
    plugin
        .attach(&mut schema, SequenceOptions::new("Order"))
        .unwrap();

    let mut record = save_new(&schema).await;
    assert_eq!(record.str_field("no"), Some("0"));

    record.fields.insert("status".into(), json!("shipped"));
    schema.save(&mut record).await.unwrap();
    schema.save(&mut record).await.unwrap();
    assert_eq!(record.str_field("no"), Some("0"));

    let store = MemoryCounterStore::initialize(&connection).unwrap();
    let counter = store.find_counter("Order", "no").await.unwrap().unwrap();
    assert_eq!(counter.count, 0, "updates must not advance the counter");
}

// =============================================================================
// Configuration and initialization errors
// =============================================================================

#[tokio::test]
async fn reserved_field_is_a_configuration_error() {
    let (plugin, _conn) = memory_plugin();
    let mut schema = TestSchema::new();
    let options = SequenceOptions::from_value(&json!({ "model": "Order", "field": "_id" })).unwrap();
    let err = plugin.attach(&mut schema, options).unwrap_err();
    assert!(matches!(err, SequenceError::Configuration(_)), "{err:?}");
}

#[tokio::test]
async fn missing_model_is_a_configuration_error() {
    let (plugin, _conn) = memory_plugin();
    let mut schema = TestSchema::new();
    let options = SequenceOptions::from_value(&json!({})).unwrap();
    let err = plugin.attach(&mut schema, options).unwrap_err();
    assert!(matches!(err, SequenceError::Configuration(_)), "{err:?}");
}

#[test]
fn attach_before_initialize_is_rejected() {
    let plugin = SequencePlugin::<RocksDbCounterStore>::new();
    let mut schema = TestSchema::new();
    let err = plugin
        .attach(&mut schema, SequenceOptions::new("Order"))
        .unwrap_err();
    assert!(matches!(err, SequenceError::NotInitialized), "{err:?}");
    assert!(!plugin.is_initialized());
}

// =============================================================================
// Failure propagation
// =============================================================================

#[tokio::test]
async fn failing_prefix_aborts_the_save() {
    let (plugin, _conn) = memory_plugin();
    let mut schema = TestSchema::new();
    let prefix = Affix::computed_async(|_doc| async {
        Err::<String, _>(AffixError::from("region service unavailable"))
    });
    plugin
        .attach(&mut schema, SequenceOptions::new("Shipment").prefix(prefix))
        .unwrap();

    let mut record = Record::new();
    let err = schema.save(&mut record).await.unwrap_err();
    assert!(
        matches!(err, SequenceError::Affix { part: "prefix", .. }),
        "{err:?}"
    );
    assert!(!record.persisted);
    assert_eq!(record.str_field("no"), None);
    assert_eq!(
        plugin
            .metrics()
            .failures_total
            .load(std::sync::atomic::Ordering::Relaxed),
        1
    );
}

#[tokio::test]
async fn counter_overflow_aborts_the_save() {
    let (plugin, _conn) = memory_plugin();
    let mut schema = TestSchema::new();
    plugin
        .attach(
            &mut schema,
            SequenceOptions::new("Big").start_at(i64::MAX).increment_by(1),
        )
        .unwrap();

    assert_eq!(
        save_new(&schema).await.str_field("no"),
        Some(i64::MAX.to_string().as_str())
    );

    let mut record = Record::new();
    let err = schema.save(&mut record).await.unwrap_err();
    assert!(matches!(err, SequenceError::Store { .. }), "{err:?}");
    assert!(!record.persisted);
}

#[tokio::test]
async fn metrics_are_exposed_in_prometheus_format() {
    let (plugin, _conn) = memory_plugin();
    let mut schema = TestSchema::new();
    plugin
        .attach(&mut schema, SequenceOptions::new("Order").start_at(41))
        .unwrap();
    save_new(&schema).await;
    save_new(&schema).await;

    let output = plugin.metrics().format_prometheus();
    assert!(output.contains("docseq_assigned_total 2"));
    assert!(output.contains("docseq_counters_created_total 1"));
    assert!(output.contains("docseq_last_count{model=\"Order\",field=\"no\"} 42"));
}
