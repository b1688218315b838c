//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` when it parses, otherwise `default_filter`, otherwise `info`.
pub fn filter(default_filter: &str) -> EnvFilter {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    parse_filter(from_env.as_deref(), default_filter)
}

fn parse_filter(directives: Option<&str>, default_filter: &str) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .or_else(|| EnvFilter::try_new(default_filter).ok())
        .unwrap_or_else(|| EnvFilter::new(crate::DEFAULT_FILTER))
}

/// Install the JSON subscriber. Later calls leave the first one in place.
pub fn init(default_filter: &str) {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter(default_filter))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init()
        .is_ok();

    if installed {
        ::tracing::debug!("tracing initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_a_no_op() {
        init("debug");
        init("warn");
        crate::init();
    }

    #[test]
    fn malformed_default_falls_back_to_info() {
        assert_eq!(parse_filter(None, "plantflow=notalevel").to_string(), "info");
    }

    #[test]
    fn environment_wins_when_it_parses() {
        assert_eq!(parse_filter(Some("debug"), "warn").to_string(), "debug");
        assert_eq!(parse_filter(Some("plantflow=notalevel"), "warn").to_string(), "warn");
    }
}
