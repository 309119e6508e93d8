use std::time::Instant;
use tracing::{error, info, warn};

use tracing_fluentd_json::init::{init_tracing_with_config, LayerConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing_with_config(std::io::stdout, LayerConfig::from_env())?;

    info!("starting service");

    warn!(time = "client-supplied", msg = "kept under fields.*", "clashing fields");

    error!(
        user_id = 42,
        reason = "invalid password",
        "authentication failed"
    );

    let n: u64 = 10_000;
    let start = Instant::now();
    for i in 0..n {
        info!(iteration = i, "load test line");
    }
    let elapsed = start.elapsed();
    eprintln!(
        "formatted {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );
    Ok(())
}
