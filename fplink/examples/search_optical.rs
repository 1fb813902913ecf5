//! Search for a fingerprint on the optical sensor
//!
//! Usage: search_optical [port]

use std::sync::Arc;

use fplink::{MemoryStore, OpticalSensor, SearchOptions, SearchOutcome, SensorHandle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/ttyUSB1".to_string());

    println!("Searching via {port}...");

    let sensor = OpticalSensor::on_port(port);
    let handle = SensorHandle::new(sensor, Arc::new(MemoryStore::new()));

    handle.connect().await?;

    match handle.search(SearchOptions::default()).await? {
        SearchOutcome::Match { slot, label, .. } => {
            println!("✓ Matched {label} (slot {slot})");
        }
        SearchOutcome::UnresolvedMatch { slot, .. } => {
            println!("! Device matched slot {slot}, but no identity is on record for it");
        }
        SearchOutcome::NoMatch { .. } => {
            println!("✗ No match");
        }
    }

    handle.disconnect().await?;
    Ok(())
}
