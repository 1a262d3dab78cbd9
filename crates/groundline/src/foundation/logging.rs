//! Logging utilities and structured logging support

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system at `info`, unless `RUST_LOG` says otherwise
///
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    init_with_default("info");
}

/// Initialize the logging system with a default filter such as `"debug"` or
/// `"groundline=trace"`, used when `RUST_LOG` is unset
pub fn init_with_default(filter: &str) {
    let env = env_logger::Env::default().default_filter_or(filter);
    let _ = env_logger::Builder::from_env(env).try_init();
}
