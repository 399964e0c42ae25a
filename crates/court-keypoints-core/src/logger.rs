//! Minimal logger.
//!
//! Prints `[elapsed LEVEL target] message` to stderr. Use `init_with_level`
//! once at startup; library code only talks to the `log` facade.

use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

struct SimpleLogger {
    level: LevelFilter,
    started: Instant,
}

impl Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let target = short_target(record.target());
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:7.3}s {:>5} {}] {}",
            elapsed,
            record.level(),
            target,
            record.args()
        );
    }

    fn flush(&self) {}
}

/// Last path segment of a module target (`court_keypoints::reconcile` ->
/// `reconcile`).
fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

static LOGGER: OnceLock<SimpleLogger> = OnceLock::new();

/// Install the simple logger with the provided level filter.
///
/// Calling this more than once is a no-op after the first successful
/// initialization.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| SimpleLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Parse `"error" | "warn" | "info" | "debug" | "trace" | "off"`, falling back
/// to `Info` for anything else.
pub fn parse_level_filter(raw: &str) -> LevelFilter {
    LevelFilter::from_str(raw.trim()).unwrap_or(LevelFilter::Info)
}

/// Install a `tracing` subscriber. `RUST_LOG` wins over `default_level`.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .json()
            .flatten_event(true)
            .finish()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing_falls_back_to_info() {
        assert_eq!(parse_level_filter("debug"), LevelFilter::Debug);
        assert_eq!(parse_level_filter(" WARN "), LevelFilter::Warn);
        assert_eq!(parse_level_filter("loud"), LevelFilter::Info);
    }

    #[test]
    fn target_column_keeps_the_module_name() {
        assert_eq!(short_target("court_keypoints::pipeline"), "pipeline");
        assert_eq!(short_target("court_keypoints_heatmap::decode"), "decode");
        assert_eq!(short_target("main"), "main");
    }
}
