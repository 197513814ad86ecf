//! Log setup for `gitlab-comment`.
//!
//! The wrapped command owns stdout, so every log line goes to stderr.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// HTTP internals stay at `warn` unless `RUST_LOG` asks otherwise.
const QUIET_DEPENDENCIES: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls"];

/// Directive used when `RUST_LOG` is unset.
fn default_directive(level: Level) -> String {
    let mut directive = level.as_str().to_ascii_lowercase();
    for dep in QUIET_DEPENDENCIES {
        directive.push_str(&format!(",{dep}=warn"));
    }
    directive
}

/// Install the global subscriber: `RUST_LOG` if set, else `level`; JSON
/// lines with `json`. Only the first call in a process has any effect.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    let (text, json) = if json {
        let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        (None, Some(layer.json()))
    } else {
        let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        (Some(layer), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .try_init()
        .ok();
}

/// Parse a `--log-level` value (`trace`, `debug`, `info`, `warn`, `error`).
pub fn parse_level(value: &str) -> Option<Level> {
    value.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Some(Level::DEBUG));
        assert_eq!(parse_level("WARN"), Some(Level::WARN));
        assert_eq!(parse_level("loud"), None);
    }

    #[test]
    fn test_default_directive_quiets_http_stack() {
        let directive = default_directive(Level::DEBUG);
        assert!(directive.starts_with("debug,"));
        assert!(directive.contains("reqwest=warn"));
        assert!(directive.contains("hyper=warn"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }
}
