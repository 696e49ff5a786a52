use super::Config;
use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::Path;

impl Config {
    /// Load `~/.parley/config.toml`, writing defaults on first run.
    pub fn load_or_init() -> Result<Self, ConfigError> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .ok_or_else(|| ConfigError::Load("Could not find home directory".into()))?;
        Self::load_or_init_in(&home.join(".parley"))
    }

    /// Same as [`Config::load_or_init`] rooted at an explicit directory.
    pub fn load_or_init_in(parley_dir: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_or_create(parley_dir)
            .map_err(|error| ConfigError::Load(format!("{error:#}")))?;
        config.validate()?;
        Ok(config)
    }

    fn read_or_create(parley_dir: &Path) -> Result<Self> {
        let config_path = parley_dir.join("config.toml");

        if !parley_dir.exists() {
            fs::create_dir_all(parley_dir).context("Failed to create .parley directory")?;
        }

        if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path;
            Ok(config)
        } else {
            let config = Self {
                config_path,
                ..Self::default()
            };
            config.save()?;
            tracing::info!(path = %config.config_path.display(), "wrote default config");
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}
