pub mod builders;
pub mod fake_actions;

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};
use workdag::EngineConfig;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Logs go through `with_test_writer()`, so they only show up for failing
/// tests unless run with `-- --nocapture`. Filter with `RUST_LOG=debug`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Engine config with short polling and grace periods, for tests.
pub fn fast_config(workers: usize) -> EngineConfig {
    EngineConfig {
        idle_poll: Duration::from_millis(10),
        shutdown_grace: Duration::from_millis(500),
        ..EngineConfig::default()
    }
    .with_workers(workers)
}
