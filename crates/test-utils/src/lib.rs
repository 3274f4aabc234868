//! Shared helpers for yesbuild's integration tests.

pub mod builders;
pub mod fake_executor;

pub use builders::{BUILD_DIR, MockWorkspace, TaskNodeBuilder, write_nodes};
pub use fake_executor::{ExecutorCall, FakeChainExecutor, spawned};

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Logs go through `with_test_writer()`, so they only show for failing
/// tests (or with `-- --nocapture`). The level comes from `YESBUILD_LOG`,
/// e.g. `YESBUILD_LOG=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(yesbuild::logging::LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new("warn"));

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
        .expect("test timed out after 5 seconds")
}
