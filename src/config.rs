//! Volume and mount settings, read from YAML.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::ROOT_INODE;

pub const DEFAULT_CONFIG_FILE: &str = "flatfs.yml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub volume: VolumeConfig,

    #[serde(default)]
    pub mount: MountConfig,
}

/// Geometry used when formatting a new image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {
    #[serde(default = "default_block_count")]
    pub block_count: u32,

    #[serde(default = "default_inode_count")]
    pub inode_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    /// Name reported to the kernel as the mount source.
    #[serde(default = "default_fs_name")]
    pub fs_name: String,

    #[serde(default)]
    pub allow_root: bool,

    #[serde(default)]
    pub auto_unmount: bool,
}

fn default_block_count() -> u32 {
    4096
}

fn default_inode_count() -> u32 {
    256
}

fn default_fs_name() -> String {
    "flatfs".to_string()
}

impl Default for VolumeConfig {
    fn default() -> Self {
        VolumeConfig { block_count: default_block_count(), inode_count: default_inode_count() }
    }
}

impl Default for MountConfig {
    fn default() -> Self {
        MountConfig { fs_name: default_fs_name(), allow_root: false, auto_unmount: false }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::IoError)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// An explicit path must exist; otherwise `flatfs.yml` is used when present
    /// and the defaults when it is not.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Config::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.volume.inode_count <= ROOT_INODE + 1 {
            return Err(ConfigError::Invalid(format!(
                "volume.inode_count must be at least 3, got {}",
                self.volume.inode_count
            )));
        }
        if self.volume.block_count == 0 {
            return Err(ConfigError::Invalid("volume.block_count must be positive".to_string()));
        }
        if self.mount.fs_name.is_empty() {
            return Err(ConfigError::Invalid("mount.fs_name must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{Config, ConfigError};

    #[test]
    fn defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.volume.block_count, 4096);
        assert_eq!(config.volume.inode_count, 256);
        assert_eq!(config.mount.fs_name, "flatfs");
        assert!(!config.mount.allow_root);
    }

    #[test]
    fn partial_override() {
        let config = Config::from_yaml("volume:\n  inode_count: 64\nmount:\n  auto_unmount: true\n").unwrap();
        assert_eq!(config.volume.inode_count, 64);
        assert_eq!(config.volume.block_count, 4096);
        assert!(config.mount.auto_unmount);
        assert_eq!(config.mount.fs_name, "flatfs");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(Config::from_yaml("volume:\n  inode_count: 2\n"), Err(ConfigError::Invalid(_))));
        assert!(matches!(Config::from_yaml("volume: 12"), Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flatfs.yml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "volume:\n  block_count: 1024\nmount:\n  fs_name: scratch").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.volume.block_count, 1024);
        assert_eq!(config.mount.fs_name, "scratch");

        assert!(matches!(Config::load(Some(&dir.path().join("missing.yml"))), Err(ConfigError::IoError(_))));
    }
}
