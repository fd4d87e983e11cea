use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::Participant;
use crate::error::SymposiumError;
use crate::runner::{MetadataPolicy, RunnerConfig};
use crate::scheduler::SchedulerSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub scheduler: SchedulerSettings,
    pub provider: ProviderConfig,
    pub metadata: MetadataConfig,
    pub storage: StorageConfig,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub default_model: String,
    pub timeout_ms: u64,
    pub app_url: Option<String>,
    pub app_title: String,
    pub stream: bool,
    pub max_tokens: Option<u32>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key_env: "OPENROUTER_API_KEY".to_string(),
            default_model: "openrouter/auto".to_string(),
            timeout_ms: 120000,
            app_url: None,
            app_title: "Symposium".to_string(),
            stream: true,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl MetadataConfig {
    pub fn policy(&self) -> MetadataPolicy {
        MetadataPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub compact_on_start: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("symposium")
                .join("conversations"),
            compact_on_start: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            scheduler: SchedulerSettings::default(),
            provider: ProviderConfig::default(),
            metadata: MetadataConfig::default(),
            storage: StorageConfig::default(),
            participants: default_participants(),
        }
    }
}

fn default_participants() -> Vec<Participant> {
    vec![
        Participant::new("analyst", "Analyst")
            .with_eagerness(0.6)
            .with_prompt("You are Analyst. Break problems down and question assumptions. Keep replies short."),
        Participant::new("optimist", "Optimist")
            .with_eagerness(0.5)
            .with_prompt("You are Optimist. Build on other people's ideas and look for what could work. Keep replies short."),
    ]
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate().context("Invalid config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> crate::error::Result<()> {
        self.scheduler.validate()?;

        let mut seen = HashSet::new();
        for participant in &self.participants {
            if participant.id.trim().is_empty() {
                return Err(SymposiumError::Config("participant id must not be empty".to_string()));
            }
            if !seen.insert(participant.id.as_str()) {
                return Err(SymposiumError::Config(format!(
                    "duplicate participant id: {}",
                    participant.id
                )));
            }
        }
        Ok(())
    }

    /// Runner settings derived from the provider and metadata sections
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            use_streaming: self.provider.stream,
            max_tokens: self.provider.max_tokens,
            metadata: self.metadata.policy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ResponsePacing;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.scheduler.max_concurrent, 2);
        assert_eq!(config.scheduler.response_pacing, ResponsePacing::Steady);
        assert_eq!(config.provider.api_key_env, "OPENROUTER_API_KEY");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("symposium.yml");
        fs::write(
            &path,
            r#"
scheduler:
  max_concurrent: 3
  response_pacing: quick
participants:
  - id: alpha
    name: Alpha
    eagerness: 0.6
    politeness_penalty: 0.3
    politeness_half_life: 2
    mention_boost: 0.5
"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.scheduler.max_concurrent, 3);
        assert_eq!(config.scheduler.response_pacing, ResponsePacing::Quick);
        assert_eq!(config.scheduler.politeness_decay_multiplier, 0.8);
        assert_eq!(config.participants.len(), 1);
        assert_eq!(config.participants[0].mention_boost, 0.5);
        assert_eq!(config.participants[0].model, "openrouter/auto");
        assert!(config.provider.stream);
    }

    #[test]
    fn test_load_rejects_duplicate_ids() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dup.yml");
        fs::write(
            &path,
            "participants:\n  - id: a\n    name: A\n  - id: a\n    name: B\n",
        )
        .unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/definitely/not/here/symposium.yml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_runner_config() {
        let mut config = Config::default();
        config.provider.stream = false;
        config.metadata.max_attempts = 2;
        let runner = config.runner_config();
        assert!(!runner.use_streaming);
        assert_eq!(runner.metadata.max_attempts, 2);
        assert_eq!(runner.metadata.initial_delay, Duration::from_millis(500));
    }
}
