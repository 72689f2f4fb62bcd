use std::sync::Once;
use std::time::Instant;

use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness. `RUST_LOG` applies;
/// defaults to `cmap=debug`.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cmap=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Bracketed progress output for long scenario tests.
pub struct TestLogger {
    test_name: String,
    start_time: Instant,
}

impl TestLogger {
    pub fn new(test_name: &str) -> Self {
        init_test_tracing();
        println!("\n[TEST START] {test_name}");
        Self {
            test_name: test_name.to_string(),
            start_time: Instant::now(),
        }
    }

    pub fn step(&self, description: &str) {
        println!("[STEP] {description}");
    }

    pub fn log_value<T: std::fmt::Debug>(&self, name: &str, value: &T) {
        println!("[VALUE] {name}: {value:?}");
    }

    pub fn pass(&self) {
        println!(
            "[RESULT] {} PASSED in {:?}\n",
            self.test_name,
            self.start_time.elapsed()
        );
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }
}
