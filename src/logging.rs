//! Tracing initialization.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable holding the log filter, e.g.
/// `SOURCEHAWK_LOG=sourcehawk::configuration=debug,sourcehawk=info`.
pub const LOG_ENV: &str = "SOURCEHAWK_LOG";

/// Install the global subscriber. Logs go to stderr so stdout stays
/// reserved for reports.
///
/// Falls back to `sourcehawk=warn` when the variable is unset or invalid.
/// Idempotent.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("sourcehawk=warn"));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .init();
    });
}
