//! Enroll a fingerprint on the capacitive sensor
//!
//! Usage: enroll_capacitive <label> [port]

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use fplink::{Bitmap, CapacitiveSensor, EnrollOptions, MemoryStore, SensorHandle, WorkflowEvents};

/// Prints progress and saves each accepted sample next to the binary
struct ConsoleEvents {
    out_dir: PathBuf,
}

impl WorkflowEvents for ConsoleEvents {
    fn progress(&self, message: &str) {
        println!("{message}");
    }

    fn sample_ready(&self, sample: u8, image: &Bitmap) {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let path = self.out_dir.join(format!("enroll_{stamp}_s{sample}.bmp"));

        match image.write_bmp(&path) {
            Ok(()) => println!("  saved {}", path.display()),
            Err(e) => eprintln!("  could not save sample image: {e}"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let label = args.next().unwrap_or_else(|| "demo-user".to_string());
    let port = args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    println!("Enrolling '{label}' via {port}...");

    let sensor = CapacitiveSensor::on_port(port);
    let handle = SensorHandle::new(sensor, Arc::new(MemoryStore::new())).with_events(Arc::new(
        ConsoleEvents {
            out_dir: std::env::temp_dir(),
        },
    ));

    handle.connect().await?;

    let outcome = handle.enroll(EnrollOptions::new(label)).await?;
    println!("✓ Enrolled {} at slot {}", outcome.label, outcome.slot);

    println!("Occupied slots: {:?}", handle.enumerate_slots().await?);

    handle.disconnect().await?;
    Ok(())
}
