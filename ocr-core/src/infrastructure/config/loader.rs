//! Configuration loader using Figment for layered config management.
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. TOML config file
//! 3. Environment variables (OCR_* prefix)

use crate::foundation::OcrError;
use crate::infrastructure::config::types::NodeConfig;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use log::{debug, info};
use std::path::Path;

/// Environment variable prefix for config overrides.
///
/// Example: `OCR_TRANSMISSION__POLL_INTERVAL_MS` -> `transmission.poll_interval_ms`
pub const ENV_PREFIX: &str = "OCR_";

pub const CONFIG_FILE_NAME: &str = "ocr-config.toml";

/// Load configuration from `path` (if it exists) layered over defaults and under the environment.
pub fn load_config(path: Option<&Path>) -> Result<NodeConfig, OcrError> {
    let config: NodeConfig = figment_base(path).merge(Env::prefixed(ENV_PREFIX).split("__")).extract()?;
    debug!(
        "configuration loaded data_dir={} log_level={} inbox_capacity={}",
        config.node.data_dir, config.logging.level, config.transport.inbox_capacity
    );
    Ok(config)
}

/// Load and validate, folding every validation failure into one error.
pub fn load_validated_config(path: Option<&Path>) -> Result<NodeConfig, OcrError> {
    let config = load_config(path)?;
    config.validate().map_err(|errors| OcrError::ConfigError(format!("validation failed: {}", errors.join("; "))))?;
    Ok(config)
}

fn figment_base(path: Option<&Path>) -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(NodeConfig::default()));
    match path {
        Some(path) if path.exists() => {
            info!("loading configuration path={}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        Some(path) => debug!("configuration file missing; using defaults and env only path={}", path.display()),
        None => debug!("no configuration file given; using defaults and env only"),
    }
    figment
}

/// Renders `config` as TOML, used to write a sample file.
pub fn to_toml(config: &NodeConfig) -> Result<String, OcrError> {
    toml::to_string_pretty(config).map_err(|err| crate::serde_err!("toml", err))
}
