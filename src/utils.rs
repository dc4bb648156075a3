// src/utils.rs

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;
use url::Url;

/// Reads an environment variable, returning an empty string when unset.
pub fn get_env(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}

/// Resolves an endpoint from the environment, falling back to `default`.
/// Overrides that are not absolute URLs are ignored.
pub fn resolve_url(env_key: &str, default: &str) -> String {
    let value = get_env(env_key);
    if value.is_empty() {
        return default.to_string();
    }

    match Url::parse(&value) {
        Ok(_) => value,
        Err(e) => {
            warn!(env_key, %e, "ignoring invalid URL override");
            default.to_string()
        }
    }
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("Failed to create directory {:?}", path))
}

/// Splits a `NAME=VALUE` command line pair.
pub fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))?;
    if key.trim().is_empty() {
        return Err(format!("empty name in `{raw}`"));
    }
    Ok((key.trim().to_string(), value.to_string()))
}
