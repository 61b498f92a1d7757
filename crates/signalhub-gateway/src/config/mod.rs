//! Hub config loader (strict parsing, built-in defaults).

pub mod schema;

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use signalhub_core::error::{HubError, Result};

pub use schema::{CompressionSection, HubConfig, LimitsSection, OverflowPolicy, ServerSection};

/// File read from the working directory when present.
pub const DEFAULT_CONFIG_PATH: &str = "signalhub.yaml";

/// Load `path` if it exists, otherwise fall back to in-process defaults.
/// A file that exists but fails to parse or validate is an error.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<HubConfig> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(s) => {
            tracing::info!(path = %path.display(), "loading config file");
            load_from_str(&s)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            let cfg = HubConfig::default();
            cfg.validate()?;
            Ok(cfg)
        }
        Err(e) => Err(HubError::Internal(format!("read config failed: {e}"))),
    }
}

pub fn load_from_str(s: &str) -> Result<HubConfig> {
    let cfg: HubConfig = serde_yaml::from_str(s)
        .map_err(|e| HubError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
