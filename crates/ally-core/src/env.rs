// Environment detection and logger setup.

use std::sync::OnceLock;

/// Cached environment mode.
static ENV_MODE: OnceLock<EnvMode> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvMode {
    Production,
    Development,
    Test,
}

impl EnvMode {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "test" | "testing" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Detect the current environment mode.
/// Checks `ALLY_ENV` then `RUST_ENV`.
pub fn detect_env_mode() -> EnvMode {
    *ENV_MODE.get_or_init(|| {
        let env_val = std::env::var("ALLY_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        EnvMode::parse(&env_val)
    })
}

pub fn is_production() -> bool {
    detect_env_mode() == EnvMode::Production
}

/// Install a `tracing` fmt subscriber filtered by `RUST_LOG`, falling back to
/// `ally=info` in production and `ally=debug` elsewhere.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_logger() -> bool {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if is_production() {
            EnvFilter::new("ally=info")
        } else {
            EnvFilter::new("ally=debug")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .try_init()
        .is_ok()
}
