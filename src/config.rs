use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::HarvestError;
use crate::materialize::Layout;
use crate::poll::PollPolicy;
use crate::{pubchem, zinc};

pub const CONFIG_FILE_NAME: &str = "ligand-harvester.json";
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub layout: Option<Layout>,
    #[serde(default)]
    pub max: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub pubchem: PubchemSection,
    #[serde(default)]
    pub zinc: ZincSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PubchemSection {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub poll: PollSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PollSection {
    #[serde(default)]
    pub initial_wait_ms: Option<u64>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub backoff_factor: Option<f64>,
    #[serde(default)]
    pub max_wait_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ZincSection {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub tanimoto: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub output_dir: Utf8PathBuf,
    pub layout: Layout,
    pub max: Option<usize>,
    pub timeout: Duration,
    pub pubchem_base_url: String,
    pub poll: PollPolicy,
    pub zinc_enabled: bool,
    pub zinc_base_url: String,
    pub zinc_tanimoto: u8,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            output_dir: Utf8PathBuf::from("ligand"),
            layout: Layout::Flat,
            max: None,
            timeout: Duration::from_secs(30),
            pubchem_base_url: pubchem::DEFAULT_BASE_URL.to_string(),
            poll: PollPolicy::default(),
            zinc_enabled: true,
            zinc_base_url: zinc::DEFAULT_BASE_URL.to_string(),
            zinc_tanimoto: zinc::DEFAULT_TANIMOTO,
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads an explicit config file, or the first of `./ligand-harvester.json` and
    /// the per-user config file that exists. Without any file the defaults apply.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, HarvestError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::discover(),
        };
        let Some(config_path) = config_path else {
            tracing::debug!("no config file found, using defaults");
            return Self::resolve_config(Config::default());
        };

        tracing::debug!(path = %config_path.display(), "loading config");
        let content = fs::read_to_string(&config_path)
            .map_err(|_| HarvestError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| HarvestError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, HarvestError> {
        let defaults = ResolvedConfig::default();

        if let Some(version) = config.schema_version {
            if version != SCHEMA_VERSION {
                return Err(HarvestError::ConfigParse(format!(
                    "unsupported schema_version {version}, expected {SCHEMA_VERSION}"
                )));
            }
        }
        if config.max == Some(0) {
            return Err(HarvestError::InvalidLimit(
                "max must be at least 1".to_string(),
            ));
        }
        if let Some(factor) = config.pubchem.poll.backoff_factor {
            if !factor.is_finite() || factor < 1.0 {
                return Err(HarvestError::ConfigParse(format!(
                    "pubchem.poll.backoff_factor must be >= 1.0, got {factor}"
                )));
            }
        }

        let poll = PollPolicy {
            initial_wait: config
                .pubchem
                .poll
                .initial_wait_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll.initial_wait),
            max_attempts: config
                .pubchem
                .poll
                .max_attempts
                .unwrap_or(defaults.poll.max_attempts)
                .max(1),
            backoff_factor: config
                .pubchem
                .poll
                .backoff_factor
                .unwrap_or(defaults.poll.backoff_factor),
            max_wait: config
                .pubchem
                .poll
                .max_wait_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll.max_wait),
        };

        Ok(ResolvedConfig {
            output_dir: config
                .output_dir
                .map(Utf8PathBuf::from)
                .unwrap_or(defaults.output_dir),
            layout: config.layout.unwrap_or(defaults.layout),
            max: config.max,
            timeout: config
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            pubchem_base_url: config
                .pubchem
                .base_url
                .unwrap_or(defaults.pubchem_base_url),
            poll,
            zinc_enabled: config.zinc.enabled.unwrap_or(defaults.zinc_enabled),
            zinc_base_url: config.zinc.base_url.unwrap_or(defaults.zinc_base_url),
            zinc_tanimoto: config.zinc.tanimoto.unwrap_or(defaults.zinc_tanimoto),
        })
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("ligand-harvester").join("config.json"))
            .filter(|path| path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.output_dir, Utf8PathBuf::from("ligand"));
        assert_eq!(resolved.layout, Layout::Flat);
        assert_eq!(resolved.poll, PollPolicy::default());
        assert!(resolved.zinc_enabled);
        assert_eq!(resolved.zinc_tanimoto, 30);
    }
}
