//! Logging initialization using the `tracing` ecosystem.
//!
//! Console output is always on; when a log directory is given, a second
//! plain-text layer writes to a daily-rotating file named after the module.
//! `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Width of the dashed rule on each side of a banner.
const BANNER_RULE: usize = 40;

/// Initialize the global tracing subscriber.
///
/// Should be called once at program start.
///
/// # Parameters
///
/// - `log_level`: default level if `RUST_LOG` env var is not set (e.g. `"info"`)
/// - `log_dir`: optional directory for daily-rotating log files
/// - `module_name`: used as the log file prefix (e.g. `"posrank"`)
pub fn init_logging(log_level: &str, log_dir: Option<&str>, module_name: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console_layer = fmt::layer().with_target(false).with_thread_names(true).with_ansi(true);

    if let Some(dir) = log_dir {
        let file_appender = tracing_appender::rolling::daily(dir, format!("{module_name}.log"));
        let file_layer = fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .with_target(true)
            .with_thread_names(true);

        tracing_subscriber::registry().with(env_filter).with(console_layer).with(file_layer).init();
    } else {
        tracing_subscriber::registry().with(env_filter).with(console_layer).init();
    }
}

/// Start/end banner line, e.g. `"---------- start ----------"`.
pub fn banner(word: &str) -> String {
    let rule = "-".repeat(BANNER_RULE);
    format!("{rule} {word:^5} {rule}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_is_symmetric() {
        let b = banner("end");
        assert!(b.starts_with(&"-".repeat(BANNER_RULE)));
        assert!(b.ends_with(&"-".repeat(BANNER_RULE)));
        assert!(b.contains(" end "));
        assert_eq!(banner("start").len(), banner("end").len());
    }
}
