//! Test helpers shared by the sitectx crates.
//!
//! [`init_tracing_for_tests`] installs a `tracing` subscriber once per test
//! binary; the [`fixtures`] module provides in-memory stand-ins for the
//! engine-owned collaborators (undo quantum, DR stream, topend) and a handful of
//! plan executors.

pub mod fixtures;

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize tracing for test binaries. Safe to call multiple times.
pub fn init_tracing_for_tests() {
    INIT.call_once(|| {
        use tracing_subscriber::filter::EnvFilter;
        use tracing_subscriber::fmt;
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        // Another harness may already have installed a global subscriber.
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}

#[cfg(feature = "auto-init")]
mod auto {
    use ctor::ctor;

    #[ctor]
    fn init() {
        super::init_tracing_for_tests();
    }
}
