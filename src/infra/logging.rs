//! # Logging Module / 日志模块
//!
//! Diagnostic logging through `tracing`, written to stderr so it never mixes
//! with the progress lines and reports on stdout.
//!
//! 通过 `tracing` 输出诊断日志，写入 stderr，避免与 stdout 上的进度和报告混在一起。

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Overrides the verbosity-derived filter, e.g. `MOLTEST_LOG=moltest=debug`.
pub const LOG_ENV: &str = "MOLTEST_LOG";

/// `-v` count to log level: none is `warn`, then `info`, `debug`, `trace`.
pub fn level_for_verbosity(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Installs the global subscriber. Calling it twice is harmless.
pub fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(format!("moltest={}", level_for_verbosity(verbose)))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}
