//! Bootstrap of the diagnostic log sink.
//!
//! The module is loaded into arbitrary processes, so the sink stays
//! silent at the default `warn` filter and never replaces a logger the
//! host process already installed.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes the process-wide sink once. `fallback` applies when
/// `NSS_DND_LOG` is unset; later calls are no-ops.
pub fn init(fallback: &str) {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().filter_or("NSS_DND_LOG", fallback),
        )
        .format_timestamp(None)
        .try_init();
    });
}
