// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Layered CLI configuration: defaults < TOML file < `XATTRKIT_*` environment

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use xattrkit_core::{AccessConfig, DEFAULT_MAX_RANGE_RETRIES, XattrOptions};
use xattrkit_logging::CliLogLevel;

pub const ENV_PREFIX: &str = "XATTRKIT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CliConfig {
    /// Option names applied to every command, e.g. "nofollow,show-compression"
    pub default_options: String,
    pub max_range_retries: u32,
    pub log_level: Option<CliLogLevel>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            default_options: String::new(),
            max_range_retries: DEFAULT_MAX_RANGE_RETRIES,
            log_level: None,
        }
    }
}

impl CliConfig {
    pub fn default_options(&self) -> Result<XattrOptions> {
        XattrOptions::parse_list(&self.default_options)
            .with_context(|| format!("invalid default-options {:?}", self.default_options))
    }

    pub fn access_config(&self) -> AccessConfig {
        AccessConfig {
            max_range_retries: self.max_range_retries,
        }
    }
}

/// `$XDG_CONFIG_HOME/xattrkit/config.toml` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("xattrkit").join("config.toml"))
}

/// Resolve the configuration. An explicitly named file must exist; the
/// default location is optional.
pub fn load(explicit: Option<&Path>) -> Result<CliConfig> {
    load_with_prefix(explicit, ENV_PREFIX)
}

pub fn load_with_prefix(explicit: Option<&Path>, env_prefix: &str) -> Result<CliConfig> {
    let mut builder = config::Config::builder();

    let file = match explicit {
        Some(path) => Some((path.to_path_buf(), true)),
        None => default_config_path().map(|path| (path, false)),
    };
    if let Some((path, required)) = file {
        builder = builder.add_source(
            config::File::from(path)
                .format(config::FileFormat::Toml)
                .required(required),
        );
    }

    // XATTRKIT_MAX_RANGE_RETRIES -> max-range-retries
    builder = builder.add_source(
        config::Environment::with_prefix(env_prefix)
            .prefix_separator("_")
            .separator("__")
            .convert_case(config::Case::Kebab),
    );

    let built = builder.build().context("loading xattrkit configuration")?;
    built
        .try_deserialize::<CliConfig>()
        .context("invalid xattrkit configuration")
}
