// Logging setup on top of tracing-subscriber
//
// Hosts call `init_logging` once at startup. Library code only emits
// `tracing` events with targets "auth", "gate", "validation" and "web".

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Build the `EnvFilter`: `RUST_LOG` when set, otherwise the configured base
/// level plus per-target overrides.
pub fn build_env_filter(cfg: &LoggingConfig) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let mut directives = vec![cfg.level.clone()];
    for (target, lvl) in cfg.target_levels.iter() {
        directives.push(format!("{}={}", target, lvl));
    }
    let filter_str = directives.join(",");
    EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{}': {}", filter_str, e))
}

/// Install the global fmt subscriber. Safe to call more than once; later
/// calls leave the first subscriber in place.
pub fn init_logging(cfg: &LoggingConfig) -> anyhow::Result<()> {
    let filter = build_env_filter(cfg)?;
    if fmt().with_env_filter(filter).with_target(true).try_init().is_err() {
        tracing::debug!("global subscriber already installed");
    }
    tracing::info!(target: "startup", level = %cfg.level, "gatehouse logging initialized");
    Ok(())
}

/// Shorten a secret-bearing token (session id, hash) for log lines.
pub fn redact(token: &str) -> String {
    let head: String = token.chars().take(6).collect();
    format!("{}…", head)
}
