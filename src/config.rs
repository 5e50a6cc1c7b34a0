// rc file configuration (~/.stagehand/rc)

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::models::ROLE_AUTO;

const CONFIG_DIR: &str = ".stagehand";
const CONFIG_FILE: &str = "rc";
const DEFAULT_DB_FILE: &str = "statements.db";

/// Settings read from the rc file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Database path; relative paths are already resolved against the rc directory
    pub data_location: Option<PathBuf>,
    /// Default acting role
    pub role: Option<String>,
}

impl Config {
    /// Directory holding the rc file and the default database
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR)
    }

    /// Get the configuration file path
    pub fn path() -> PathBuf {
        Self::dir().join(CONFIG_FILE)
    }

    /// Load the rc file; a missing file yields the defaults
    pub fn load() -> Result<Self> {
        let path = Self::path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Ok(Self::parse(&content, path.parent().unwrap_or(Path::new("."))))
    }

    /// Parse `key=value` lines. Unknown keys and `#` comments are ignored.
    pub fn parse(content: &str, base_dir: &Path) -> Self {
        let mut config = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                log::warn!("Ignoring malformed config line: {}", line);
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "data.location" => {
                    let path = PathBuf::from(value);
                    config.data_location = Some(if path.is_relative() {
                        base_dir.join(path)
                    } else {
                        path
                    });
                }
                "role" => config.role = Some(value.to_string()),
                other => log::debug!("Ignoring unknown config key: {}", other),
            }
        }
        config
    }

    /// Database path, falling back to `~/.stagehand/statements.db`
    pub fn database_path(&self) -> PathBuf {
        self.data_location
            .clone()
            .unwrap_or_else(|| Self::dir().join(DEFAULT_DB_FILE))
    }

    /// Default role when none is given on the command line
    pub fn role(&self) -> &str {
        self.role.as_deref().unwrap_or(ROLE_AUTO)
    }
}
