// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./switchyard.toml` > `~/.config/switchyard/switchyard.toml`
//! > `/etc/switchyard/switchyard.toml` with environment variable overrides via
//! the `SWITCHYARD_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SwitchyardConfig;

/// Sections reachable through `SWITCHYARD_<SECTION>_<KEY>` variables.
const ENV_SECTIONS: &[&str] = &[
    "engine",
    "storage",
    "cost",
    "classifier",
    "templates",
    "cache",
    "prediction",
    "selector",
    "fallback",
    "batching",
    "learning",
    "workers",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/switchyard/switchyard.toml` (system-wide)
/// 3. `~/.config/switchyard/switchyard.toml` (user XDG config)
/// 4. `./switchyard.toml` (local directory)
/// 5. `SWITCHYARD_*` environment variables
pub fn load_config() -> Result<SwitchyardConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<SwitchyardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SwitchyardConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SwitchyardConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SwitchyardConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(SwitchyardConfig::default()))
        .merge(Toml::file("/etc/switchyard/switchyard.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("switchyard/switchyard.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("switchyard.toml"))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `SWITCHYARD_CACHE_MAX_ENTRIES` maps to `cache.max_entries`, not
/// `cache.max.entries`.
fn env_provider() -> Env {
    Env::prefixed("SWITCHYARD_").map(|key| env_key_to_path(key.as_str()).into())
}

pub(crate) fn env_key_to_path(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key.strip_prefix(section) {
            if let Some(field) = rest.strip_prefix('_') {
                return format!("{section}.{field}");
            }
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_first_underscore_only() {
        assert_eq!(env_key_to_path("cache_max_entries"), "cache.max_entries");
        assert_eq!(env_key_to_path("cost_period_budget_usd"), "cost.period_budget_usd");
        assert_eq!(env_key_to_path("engine_log_level"), "engine.log_level");
        assert_eq!(env_key_to_path("unknown_key"), "unknown_key");
    }

    #[test]
    fn string_overrides_defaults() {
        let config = load_config_from_str("[learning]\nalpha = 0.25\n").unwrap();
        assert_eq!(config.learning.alpha, 0.25);
        assert_eq!(config.fallback.max_attempts, 3);
    }
}
