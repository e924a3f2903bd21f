// Configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const PROD: &str = "prod";
#[allow(dead_code)]
pub const DEV: &str = "dev";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub cache: CacheBox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheBox {
    pub env: String,
    pub logs: Option<Logs>,
    pub runtime: Option<Runtime>,
    pub api: Api,
    pub data: Option<Data>,
    pub engine: Engine,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Runtime {
    pub num_cpus: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Api {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Data {
    pub aof_path: Option<String>,
}

/// The consistent-hashing and LRU+TTL knobs for the cache engine itself.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Engine {
    pub shard_count: usize,
    pub replicas: usize,
    pub shard_capacity: usize,
    #[serde(rename = "janitor_interval", with = "humantime_serde")]
    pub janitor_interval: Duration,
    #[serde(rename = "aof_sync_interval", with = "humantime_serde")]
    pub aof_sync_interval: Duration,
}

pub trait ConfigTrait {
    fn logs(&self) -> Option<&Logs>;
    fn is_prod(&self) -> bool;
    fn runtime(&self) -> &Runtime;
    fn api(&self) -> &Api;
    fn data(&self) -> Option<&Data>;
    fn engine(&self) -> &Engine;
}

pub type Config = Settings;

impl ConfigTrait for Config {
    fn logs(&self) -> Option<&Logs> {
        self.cache.logs.as_ref()
    }

    fn is_prod(&self) -> bool {
        self.cache.env == PROD
    }

    fn runtime(&self) -> &Runtime {
        static DEFAULT: Runtime = Runtime { num_cpus: 0 };
        self.cache.runtime.as_ref().unwrap_or(&DEFAULT)
    }

    fn api(&self) -> &Api {
        &self.cache.api
    }

    fn data(&self) -> Option<&Data> {
        self.cache.data.as_ref()
    }

    fn engine(&self) -> &Engine {
        &self.cache.engine
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path: PathBuf = path.as_ref().to_path_buf();

        let data = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        let cfg: Settings =
            serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse { path, source })?;

        if cfg.cache.engine.shard_count == 0 {
            return Err(ConfigError::Invalid {
                field: "cache.engine.shard_count",
                reason: "must be positive".into(),
            });
        }
        if cfg.cache.engine.replicas == 0 {
            return Err(ConfigError::Invalid {
                field: "cache.engine.replicas",
                reason: "must be positive".into(),
            });
        }
        if cfg.cache.engine.shard_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "cache.engine.shard_capacity",
                reason: "must be positive".into(),
            });
        }

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_yaml(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.yaml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_well_formed_config() {
        let (_dir, path) = write_yaml(
            r#"
cache:
  env: dev
  logs:
    level: debug
  api:
    port: 8080
  engine:
    shard_count: 16
    replicas: 3
    shard_capacity: 1000
    janitor_interval: 1s
    aof_sync_interval: 1s
"#,
        );
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.engine().shard_count, 16);
        assert_eq!(cfg.engine().janitor_interval, Duration::from_secs(1));
        assert!(!cfg.is_prod());
    }

    #[test]
    fn rejects_zero_shard_count() {
        let (_dir, path) = write_yaml(
            r#"
cache:
  env: dev
  api:
    port: 8080
  engine:
    shard_count: 0
    replicas: 3
    shard_capacity: 1000
    janitor_interval: 1s
    aof_sync_interval: 1s
"#,
        );
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Invalid { field: "cache.engine.shard_count", .. })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load("/nonexistent/path/cfg.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
