// src/config/mod.rs
mod notifier;

pub use notifier::{
    GeneralConfig, NotifierConfig, ServerConfig, SlackConfig, StashConfig,
    ENV_SLACK_WEBHOOK_URL, ENV_STASH_ACCESS_TOKEN,
};

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "NOTIFIER_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/notifier.toml";
pub const DEFAULT_JSON_PATH: &str = "config/notifier.json";

/// Load configuration from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<NotifierConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading notifier config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse(&content, &ext).with_context(|| format!("loading {}", path.display()))
}

/// Load configuration using env var + fallbacks:
/// 1) $NOTIFIER_CONFIG_PATH
/// 2) config/notifier.toml
/// 3) config/notifier.json
pub fn load_default() -> Result<NotifierConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_from(&p);
        }
    }
    Err(anyhow!(
        "no notifier config found (set {ENV_CONFIG_PATH} or create {DEFAULT_TOML_PATH})"
    ))
}

fn parse(s: &str, ext: &str) -> Result<NotifierConfig> {
    let raw: NotifierConfig = match ext {
        "json" => serde_json::from_str(s).context("parsing JSON config")?,
        _ => toml::from_str(s).context("parsing TOML config")?,
    };
    raw.finalize()
}
