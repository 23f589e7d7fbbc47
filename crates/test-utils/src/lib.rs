//! Helpers shared by rebuildd's integration tests.
//!
//! [`fake_toolchain::FakeToolchain`] stands in for `git` and `make` so the
//! orchestrator can be driven without spawning processes or touching a real
//! repository.

pub mod fake_toolchain;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Upper bound for any single awaited step in a test. Fake builds finish in
/// milliseconds; only the real-`sh` runner tests come close.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a per-test log writer once per test binary.
///
/// Defaults to `rebuildd=debug` so orchestrator decisions (skips, prunes,
/// claims) show up in the output of a failing test. Override with
/// `RUST_LOG`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,rebuildd=debug"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, panicking if it takes longer than [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(TEST_TIMEOUT, f).await {
        Ok(value) => value,
        Err(_) => panic!("test step did not finish within {TEST_TIMEOUT:?}"),
    }
}
