use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use refactors_core::{RefactorError, RefactorResult};

const DEFAULT_CONFIG_NAME: &str = "refactors.json";
const DEFAULT_SOURCE_DIR: &str = "refactors";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite { path: Option<String> },
    Postgres { url: String },
    Mysql { url: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub acquire_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory holding refactor unit sources.
    pub source_dir: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefactorConfig {
    pub database: DatabaseConfig,
    pub pool: Option<PoolConfig>,
    pub refactors: Option<SourceConfig>,
}

impl RefactorConfig {
    pub fn default_sqlite(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig::Sqlite {
                path: Some(path.into()),
            },
            pool: None,
            refactors: Some(SourceConfig {
                source_dir: Some(DEFAULT_SOURCE_DIR.to_string()),
            }),
        }
    }

    pub fn load_or_init(base_dir: &Path, default_sqlite_path: &Path) -> RefactorResult<Self> {
        fs::create_dir_all(base_dir)
            .map_err(|err| RefactorError::storage(format!("create config dir: {err}")))?;
        let config_path = base_dir.join(DEFAULT_CONFIG_NAME);
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .map_err(|err| RefactorError::storage(format!("read config: {err}")))?;
            let config: RefactorConfig = serde_json::from_str(&raw)
                .map_err(|err| RefactorError::invalid(err.to_string()))?;
            return Ok(config);
        }
        let default = RefactorConfig::default_sqlite(default_sqlite_path.to_string_lossy());
        let payload = serde_json::to_string_pretty(&default)
            .map_err(|err| RefactorError::storage(format!("serialize config: {err}")))?;
        fs::write(&config_path, payload)
            .map_err(|err| RefactorError::storage(format!("write config: {err}")))?;
        Ok(default)
    }

    pub fn sqlite_path(&self, base_dir: &Path) -> RefactorResult<PathBuf> {
        match &self.database {
            DatabaseConfig::Sqlite { path } => {
                let path = path.clone().unwrap_or_else(|| "refactors.sqlite".to_string());
                Ok(resolve(base_dir, &path))
            }
            _ => Err(RefactorError::invalid("config is not sqlite backend")),
        }
    }

    pub fn source_dir(&self, base_dir: &Path) -> PathBuf {
        let dir = self
            .refactors
            .as_ref()
            .and_then(|cfg| cfg.source_dir.as_deref())
            .unwrap_or(DEFAULT_SOURCE_DIR);
        resolve(base_dir, dir)
    }

    pub fn backend_name(&self) -> &'static str {
        match self.database {
            DatabaseConfig::Sqlite { .. } => "sqlite",
            DatabaseConfig::Postgres { .. } => "postgres",
            DatabaseConfig::Mysql { .. } => "mysql",
        }
    }

    pub fn connection_url(&self, base_dir: &Path) -> RefactorResult<String> {
        match &self.database {
            DatabaseConfig::Sqlite { .. } => {
                let path = self.sqlite_path(base_dir)?;
                Ok(format!("sqlite://{}?mode=rwc", path.display()))
            }
            DatabaseConfig::Postgres { url } | DatabaseConfig::Mysql { url } => Ok(url.clone()),
        }
    }
}

fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let candidate = PathBuf::from(path);
    if candidate.is_absolute() {
        candidate
    } else {
        base_dir.join(candidate)
    }
}
