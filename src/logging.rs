use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::constants::{DEFAULT_LOG_FILTER, LOG_ENV};

/// Picks the filter directive: an explicit flag wins, then `APPVOL_LOG`,
/// then the configured value.
pub fn filter_directive(flag: Option<&str>, env: Option<&str>, configured: &str) -> String {
    flag.or(env)
        .map(str::to_string)
        .unwrap_or_else(|| configured.to_string())
}

/// Installs a stderr subscriber. Stdout carries command output only.
pub fn init(flag: Option<&str>, configured: &str) {
    let env = std::env::var(LOG_ENV).ok();
    let directive = filter_directive(flag, env.as_deref(), configured);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_beats_env_beats_config() {
        assert_eq!(filter_directive(Some("debug"), Some("info"), "warn"), "debug");
        assert_eq!(filter_directive(None, Some("info"), "warn"), "info");
        assert_eq!(filter_directive(None, None, "warn"), "warn");
    }
}
