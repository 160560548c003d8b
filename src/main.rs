use std::sync::Arc;

use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use docseq::contracts::CounterStore;
use docseq::metrics::SequenceMetrics;
use docseq::storage::{RocksDbConnection, RocksDbCounterStore, StoreConfig};
use docseq::{SequenceOptions, Sequencer, Settings};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("docseq=info".parse()?))
        .init();

    let config = StoreConfig::from_env();
    let connection = RocksDbConnection::open(&config)?;
    let store = RocksDbCounterStore::initialize(&connection)?;

    // Options use the same keys as the JSON form, read from the environment
    let mut options = Map::new();
    for (key, var) in [
        ("model", "DOCSEQ_MODEL"),
        ("field", "DOCSEQ_FIELD"),
        ("prefix", "DOCSEQ_PREFIX"),
        ("suffix", "DOCSEQ_SUFFIX"),
    ] {
        if let Ok(value) = std::env::var(var) {
            options.insert(key.into(), value.into());
        }
    }
    for (key, var) in [
        ("startAt", "DOCSEQ_START_AT"),
        ("incrementBy", "DOCSEQ_INCREMENT_BY"),
    ] {
        if let Ok(value) = std::env::var(var) {
            let parsed: i64 = value
                .parse()
                .map_err(|e| format!("{var} must be an integer: {e}"))?;
            options.insert(key.into(), parsed.into());
        }
    }
    let settings = Settings::resolve(SequenceOptions::from_value(&Value::Object(options))?)?;

    let count: usize = std::env::var("DOCSEQ_COUNT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);

    tracing::info!(
        model = %settings.model,
        field = %settings.field,
        count,
        "Emitting sequence values"
    );

    let sequencer = Sequencer::new(Arc::new(store), settings, Arc::new(SequenceMetrics::new()));
    let document = Map::new();
    for _ in 0..count {
        println!("{}", sequencer.next_value(&document).await?);
    }

    Ok(())
}
