use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use config::Config as RConfig;
use scout_common::constants::{
    DEFAULT_BACKEND_URL, DEFAULT_SERVER, REFRESH_INTERVAL_MS, REGISTRATION_RETRY_INTERVAL_MS,
};

const DEFAULT_AGENT_IP: &str = "127.0.0.1";
const DEFAULT_INSTRUMENT_ROOT: &str = "/tmp/scout/instrument";
const DEFAULT_INSTRUMENT_LIBRARY: &str = "/tmp/scout/instrument/scout-hooks.jar";
const RESTART_PROBE_ATTEMPTS: u64 = 5;
const RESTART_PROBE_DELAY_MS: u64 = 2_000;
const CONFIG_FILE_NAME: &str = "scout.toml";

/// One configured discovery signature: processes whose OS command contains
/// `signature` are classified under `display_name`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DiscoveryRule {
    pub signature: String,
    pub display_name: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    pub backend_url: String,
    pub server: String,

    pub agent_name: String,
    pub agent_ip: String,
    pub hidden: bool,

    pub refresh_interval_ms: u64,
    pub registration_retry_interval_ms: u64,
    pub restart_probe_attempts: u64,
    pub restart_probe_delay_ms: u64,

    pub instrument_root: String,
    pub instrument_library: String,

    pub discovery: Vec<DiscoveryRule>,

    pub config_sources: Vec<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from defaults, an optional file next to the
    /// binary or under the user config dir, and an explicitly passed path.
    pub fn load_config(path: Option<&str>) -> Result<Config> {
        let mut sources: Vec<String> = Vec::new();
        let mut builder = Self::builder_with_defaults()?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
            sources.push(path.to_string());
        } else {
            for candidate in Self::default_config_files() {
                if std::path::Path::new(&candidate).exists() {
                    builder = builder.add_source(config::File::with_name(&candidate));
                    sources.push(candidate);
                }
            }
        }

        let mut config: Config = builder
            .build()?
            .try_deserialize()
            .context("failed to parse config file")?;
        config.config_sources = sources;

        Ok(config)
    }

    pub fn load_default_config() -> Result<Config> {
        let config: Config = Self::builder_with_defaults()?
            .build()?
            .try_deserialize()
            .context("failed to build default config")?;
        Ok(config)
    }

    fn builder_with_defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let builder = RConfig::builder()
            .set_default("backend_url", DEFAULT_BACKEND_URL)?
            .set_default("server", DEFAULT_SERVER)?
            .set_default("agent_name", "")?
            .set_default("agent_ip", DEFAULT_AGENT_IP)?
            .set_default("hidden", false)?
            .set_default("refresh_interval_ms", REFRESH_INTERVAL_MS)?
            .set_default(
                "registration_retry_interval_ms",
                REGISTRATION_RETRY_INTERVAL_MS,
            )?
            .set_default("restart_probe_attempts", RESTART_PROBE_ATTEMPTS)?
            .set_default("restart_probe_delay_ms", RESTART_PROBE_DELAY_MS)?
            .set_default("instrument_root", DEFAULT_INSTRUMENT_ROOT)?
            .set_default("instrument_library", DEFAULT_INSTRUMENT_LIBRARY)?
            .set_default::<&str, Vec<String>>("discovery", Vec::new())?
            .set_default::<&str, Vec<String>>("config_sources", Vec::new())?;

        Ok(builder)
    }

    fn default_config_files() -> Vec<String> {
        let mut candidates = vec![CONFIG_FILE_NAME.to_string()];
        if let Some(home) = dirs::config_dir() {
            candidates.push(home.join("scout").join(CONFIG_FILE_NAME).display().to_string());
        }
        candidates
    }
}
