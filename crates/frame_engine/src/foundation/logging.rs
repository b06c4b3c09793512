//! Logging utilities and structured logging support

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    if env_logger::try_init().is_err() {
        log::debug!("Logger already initialized; keeping the existing one");
    }
}

/// Initialize the logging system with an explicit filter such as `"info"` or
/// `"frame_engine=debug,warn"`
///
/// `RUST_LOG` still wins when it is set, so a config file never hides output
/// a developer asked for on the command line.
pub fn init_with_filter(filter: &str) {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(filter);
    if let Ok(env_filter) = std::env::var("RUST_LOG") {
        builder.parse_filters(&env_filter);
    }
    if builder.try_init().is_err() {
        log::debug!("Logger already initialized; ignoring filter '{}'", filter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_keeps_first_logger() {
        init_with_filter("frame_engine=debug");
        init();
        init_with_filter("warn");
        info!("logger still usable after repeated init");
    }
}
