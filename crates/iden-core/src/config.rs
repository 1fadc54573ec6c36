use iden_merkletree::{MemoryStorage, SledStorage, Storage, MAX_PROOF_DEPTH};
use iden_types::{IdenError, IdenResult, DEFAULT_TREE_LEVELS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Sled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreesConfig {
    pub claims_levels: usize,
    pub revocations_levels: usize,
    pub roots_levels: usize,
}

impl Default for TreesConfig {
    fn default() -> Self {
        Self {
            claims_levels: DEFAULT_TREE_LEVELS,
            revocations_levels: DEFAULT_TREE_LEVELS,
            roots_levels: DEFAULT_TREE_LEVELS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Sled directory. Defaults to `<data_dir>/db`.
    pub path: Option<PathBuf>,
    /// Prepended to every key.
    pub prefix: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub freshness_secs: i64,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self { freshness_secs: 600 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonceConfig {
    pub sweep_interval: u64,
    pub default_ttl_secs: i64,
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            sweep_interval: 128,
            default_ttl_secs: 300,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
    pub json: bool,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            json: false,
            timestamps: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdenConfig {
    pub data_dir: PathBuf,
    pub trees: TreesConfig,
    pub storage: StorageConfig,
    pub verifier: VerifierConfig,
    pub nonce: NonceConfig,
    pub logging: LoggingConfig,
}

impl Default for IdenConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/var/lib/iden"));
        Self {
            data_dir: home.join(".iden"),
            trees: TreesConfig::default(),
            storage: StorageConfig::default(),
            verifier: VerifierConfig::default(),
            nonce: NonceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl IdenConfig {
    pub fn default_path() -> PathBuf {
        Self::default().data_dir.join("config.toml")
    }

    pub fn load(path: impl AsRef<Path>) -> IdenResult<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| IdenError::Config(format!("Failed to read config: {}", e)))?;

            toml::from_str(&contents)
                .map_err(|e| IdenError::Config(format!("Failed to parse config: {}", e)))?
        } else {
            info!("Config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> IdenResult<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| IdenError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| IdenError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path.as_ref(), contents)
            .map_err(|e| IdenError::Config(format!("Failed to write config: {}", e)))?;

        info!("Configuration saved to {:?}", path.as_ref());
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("IDEN_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Ok(level) = std::env::var("IDEN_LOG_LEVEL") {
            self.logging.level = match level.to_lowercase().as_str() {
                "error" => LogLevel::Error,
                "warn" => LogLevel::Warn,
                "info" => LogLevel::Info,
                "debug" => LogLevel::Debug,
                "trace" => LogLevel::Trace,
                _ => LogLevel::Info,
            };
        }

        if std::env::var("IDEN_LOG_JSON").is_ok() {
            self.logging.json = true;
        }

        if let Ok(backend) = std::env::var("IDEN_STORAGE_BACKEND") {
            self.storage.backend = match backend.to_lowercase().as_str() {
                "sled" => StorageBackend::Sled,
                _ => StorageBackend::Memory,
            };
        }
    }

    pub fn validate(&self) -> IdenResult<()> {
        let levels = [
            ("claims", self.trees.claims_levels),
            ("revocations", self.trees.revocations_levels),
            ("roots", self.trees.roots_levels),
        ];
        for (tree, n) in levels {
            if !(2..=MAX_PROOF_DEPTH).contains(&n) {
                return Err(IdenError::Config(format!(
                    "{} tree levels must be within 2..={}, got {}",
                    tree, MAX_PROOF_DEPTH, n
                )));
            }
        }

        if self.verifier.freshness_secs < 0 {
            return Err(IdenError::Config("verifier freshness cannot be negative".into()));
        }

        if self.nonce.sweep_interval == 0 {
            return Err(IdenError::Config("nonce sweep interval cannot be 0".into()));
        }

        if self.nonce.default_ttl_secs <= 0 {
            return Err(IdenError::Config("nonce lifetime must be positive".into()));
        }

        Ok(())
    }

    pub fn storage_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("db"))
    }

    /// Opens the configured backend, scoped to the configured prefix.
    pub fn open_storage(&self) -> IdenResult<Arc<dyn Storage>> {
        let storage: Arc<dyn Storage> = match self.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::Sled => Arc::new(SledStorage::open(self.storage_path())?),
        };
        info!(backend = ?self.storage.backend, info = %storage.info(), "Opened storage");

        if self.storage.prefix.is_empty() {
            Ok(storage)
        } else {
            Ok(storage.with_prefix(self.storage.prefix.as_bytes()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_roundtrip() {
        let mut config = IdenConfig::default();
        config.trees.claims_levels = 64;
        config.storage.backend = StorageBackend::Sled;
        config.storage.prefix = "alice:".into();
        config.logging.level = LogLevel::Debug;

        let text = toml::to_string_pretty(&config).unwrap();
        assert!(text.contains("backend = \"sled\""));
        assert!(text.contains("level = \"debug\""));
        let back: IdenConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: IdenConfig = toml::from_str("[verifier]\nfreshness_secs = 30\n").unwrap();
        assert_eq!(config.verifier.freshness_secs, 30);
        assert_eq!(config.trees, TreesConfig::default());
        assert_eq!(config.nonce.sweep_interval, 128);
    }

    #[test]
    fn test_validate_rejects_bad_levels() {
        let mut config = IdenConfig::default();
        config.validate().unwrap();

        config.trees.roots_levels = 1;
        assert!(matches!(config.validate(), Err(IdenError::Config(_))));

        config.trees.roots_levels = MAX_PROOF_DEPTH + 1;
        assert!(matches!(config.validate(), Err(IdenError::Config(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("iden-config-{}", std::process::id()));
        let path = dir.join("nested").join("config.toml");
        let mut config = IdenConfig::default();
        config.nonce.default_ttl_secs = 42;
        config.save(&path).unwrap();

        let loaded = IdenConfig::load(&path).unwrap();
        assert_eq!(loaded.nonce.default_ttl_secs, 42);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_memory_storage_with_prefix() {
        let mut config = IdenConfig::default();
        config.storage.prefix = "p:".into();
        let storage = config.open_storage().unwrap();
        let mut tx = storage.new_tx().unwrap();
        tx.put(b"k", b"v");
        tx.commit().unwrap();
        assert_eq!(storage.get(b"k").unwrap(), Some(b"v".to_vec()));
    }
}
