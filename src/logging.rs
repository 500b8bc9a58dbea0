// src/logging.rs
// =============================================================================
// Log setup.
//
// Logs always go to stderr. In streaming mode stdout carries one JSON record
// per item, and mixing log lines into it would corrupt the output.
//
// Level selection:
// - RUST_LOG wins when set (e.g. RUST_LOG=keysweep=debug)
// - otherwise --verbose -> debug, --quiet -> warn, default -> info
// =============================================================================

use tracing_subscriber::EnvFilter;

pub fn default_level(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    }
}

pub fn init(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbose, quiet)));

    // try_init: a second call (tests, embedding) is not an error worth dying for
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
