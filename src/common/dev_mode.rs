// src/common/dev_mode.rs
//! Development mode configuration
//!
//! In dev mode the forgot-password response echoes the issued reset URL so
//! the flow can be exercised without a working mail transport.

use std::env;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct DevModeConfig {
    pub enabled: bool,
}

impl DevModeConfig {
    pub fn from_env() -> Self {
        let enabled = env::var("DEV_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .to_lowercase()
            == "true";

        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether reset links may be returned in API responses
    pub fn exposes_reset_links(&self) -> bool {
        self.enabled
    }
}

/// Log dev mode status on startup
pub fn print_dev_mode_status(config: &DevModeConfig) {
    if config.is_enabled() {
        warn!("DEV MODE ENABLED: password reset links are echoed in API responses");
        warn!("DO NOT USE IN PRODUCTION");
    } else {
        info!("Production mode - reset links are delivered by email only");
    }
}

/// CLI argument parsing for dev mode
pub fn parse_dev_mode_args<I>(args: I) -> Option<bool>
where
    I: IntoIterator<Item = String>,
{
    for arg in args {
        match arg.as_str() {
            "--dev" | "--dev-mode" => return Some(true),
            "--no-dev" | "--prod" | "--production" => return Some(false),
            _ => {}
        }
    }

    None
}

/// Override dev mode from CLI args
pub fn apply_cli_override(mut config: DevModeConfig) -> DevModeConfig {
    if let Some(cli_dev_mode) = parse_dev_mode_args(env::args()) {
        info!(dev_mode = cli_dev_mode, "CLI override for DEV_MODE");
        config.enabled = cli_dev_mode;
    }

    config
}
