//! Shared setup for unit and integration tests.

use std::env;
use std::sync::Once;

use tracing::debug;
use tracing_subscriber::{filter::filter_fn, fmt, fmt::format::FmtSpan, prelude::*, EnvFilter};

use crate::domain::TypeRegistry;
use crate::tree::Model;

static TEST_SETUP: Once = Once::new();

/// Targets that log on every model construction.
const QUIET_TARGETS: &[&str] = &["spx_model::domain::registry", "spx_model::components"];

/// Install a test-writer subscriber once per process; `RUST_LOG` defaults to `trace`.
pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        if env::var("RUST_LOG").is_err() {
            env::set_var("RUST_LOG", "trace");
        }
        let quiet = filter_fn(|metadata| !QUIET_TARGETS.iter().any(|t| metadata.target().starts_with(t)));
        let layer = fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(quiet)
            .with_filter(EnvFilter::from_default_env());
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            debug!("Tracing subscriber already installed");
        }
    });
}

/// Model over the built-in registry, with test logging installed.
pub fn builtin_model() -> Model {
    init_test_setup();
    Model::new(TypeRegistry::with_builtins())
}
