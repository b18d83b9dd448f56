use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_LEVEL: &str = "info";

/// Log level from `RUST_LOG`, falling back to `default_level`
fn env_filter(default_level: &str) -> EnvFilter {
    filter_from(
        std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(),
        default_level,
    )
}

/// `directives` if present and parseable, else `default_level`
fn filter_from(directives: Option<&str>, default_level: &str) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(default_level))
}

/// Install the global JSON subscriber
///
/// Call once, at the top of `main`. Raw passwords and tokens must never be
/// passed as fields; log user ids and outcomes instead.
pub fn init_telemetry() {
    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json();

    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_LOG_LEVEL))
        .with(formatting_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_falls_back_to_default() {
        assert_eq!(filter_from(None, "warn").to_string(), "warn");
    }

    #[test]
    fn test_filter_prefers_directives() {
        assert_eq!(filter_from(Some("debug"), "warn").to_string(), "debug");
    }
}
