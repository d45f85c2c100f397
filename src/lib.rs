pub mod core;

use tracing_subscriber::EnvFilter;

/// Structured logging for binaries embedding the core. `RUST_LOG` overrides
/// the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mcl_lib=debug")),
        )
        .try_init();
}
