use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

const CONFIG_FILE_NAME: &str = "config.toml";
const ENV_DATA_DIR: &str = "FLOWCANVAS_DATA_DIR";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub paths: PathsConfig,
    pub repository: RepositoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the service that decompiles scripts.
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub catalog_file: PathBuf,
    pub logs_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Repository the exported pipeline is run against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5000".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            catalog_file: PathBuf::from("catalog.json"),
            logs_dir: PathBuf::from("logs"),
        }
    }
}

impl BackendConfig {
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.url).with_context(|| format!("invalid backend url: {}", self.url))
    }
}

impl AppConfig {
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config TOML: {}", path.display()))
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .context("config path does not have a parent directory")?;
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory: {}", parent.display()))?;

        let encoded = toml::to_string_pretty(self).context("failed to serialize config TOML")?;
        fs::write(path, encoded)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn default_repository(&self) -> Option<&str> {
        self.repository.default.as_deref()
    }
}

/// Resolve the data directory with 3-tier priority:
/// 1. CLI override if provided
/// 2. FLOWCANVAS_DATA_DIR environment variable
/// 3. Default: ./data
pub fn data_dir(cli_override: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_override {
        return path.to_path_buf();
    }

    if let Some(env_dir) = env::var_os(ENV_DATA_DIR) {
        return PathBuf::from(env_dir);
    }

    PathBuf::from("data")
}

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE_NAME)
}

/// Creates the data directory and writes a default config.toml, leaving an
/// existing config alone.
pub fn initialize_data_dir(data_dir: &Path) -> Result<()> {
    if !data_dir.exists() {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;
    }

    let cfg_path = config_path(data_dir);
    if !cfg_path.exists() {
        AppConfig::default().save_to_path(&cfg_path)?;
    }

    Ok(())
}

/// Returns `path` unchanged if absolute, otherwise joined to `base`.
pub fn resolve_relative_to(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.backend.url, "http://localhost:5000");
        assert_eq!(cfg.paths.catalog_file, PathBuf::from("catalog.json"));
        assert_eq!(cfg.paths.logs_dir, PathBuf::from("logs"));
        assert!(cfg.default_repository().is_none());
    }

    #[test]
    fn toml_roundtrip_preserves_values() {
        let mut original = AppConfig::default();
        original.repository.default = Some("team-pipelines".to_string());
        let encoded = toml::to_string_pretty(&original).expect("serialize config");
        let decoded: AppConfig = toml::from_str(&encoded).expect("deserialize config");
        assert_eq!(decoded, original);
    }

    #[test]
    fn partial_toml_fills_missing_sections() {
        let decoded: AppConfig =
            toml::from_str("[repository]\ndefault = \"main\"\n").expect("deserialize config");
        assert_eq!(decoded.default_repository(), Some("main"));
        assert_eq!(decoded.backend, BackendConfig::default());
    }

    #[test]
    fn load_from_nonexistent_or_empty_file_returns_defaults() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("config.toml");
        let loaded = AppConfig::load_from_path(&path).expect("load missing config");
        assert_eq!(loaded, AppConfig::default());

        fs::write(&path, "  \n").expect("write empty config");
        let loaded = AppConfig::load_from_path(&path).expect("load empty config");
        assert_eq!(loaded, AppConfig::default());
    }

    #[test]
    fn load_reports_invalid_toml() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[backend\nurl = 3").expect("write broken config");
        let err = AppConfig::load_from_path(&path).expect_err("broken config should fail");
        assert!(format!("{err:#}").contains("failed to parse config TOML"));
    }

    #[test]
    fn backend_base_url_is_validated() {
        let mut backend = BackendConfig::default();
        assert_eq!(
            backend.base_url().expect("default url").as_str(),
            "http://localhost:5000/"
        );
        backend.url = "not a url".to_string();
        assert!(backend.base_url().is_err());
    }

    #[test]
    fn data_dir_priority() {
        assert_eq!(data_dir(Some(Path::new("/custom"))), PathBuf::from("/custom"));

        let old = env::var_os(ENV_DATA_DIR);
        env::set_var(ENV_DATA_DIR, "/env/path");
        let from_env = data_dir(None);
        env::remove_var(ENV_DATA_DIR);
        let fallback = data_dir(None);
        if let Some(val) = old {
            env::set_var(ENV_DATA_DIR, val);
        }

        assert_eq!(from_env, PathBuf::from("/env/path"));
        assert_eq!(fallback, PathBuf::from("data"));
    }

    #[test]
    fn config_path_is_data_dir_join_config_toml() {
        let result = config_path(Path::new("/data"));
        assert_eq!(result, PathBuf::from("/data/config.toml"));
    }

    #[test]
    fn initialize_creates_data_dir_and_config() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let dir = temp.path().join("nested");
        initialize_data_dir(&dir).expect("initialize data dir");

        assert!(dir.join("config.toml").exists());
    }

    #[test]
    fn initialize_preserves_existing_config() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let cfg_path = temp.path().join("config.toml");
        let custom_content = "[backend]\nurl = \"http://decompiler:9000\"\n";
        fs::write(&cfg_path, custom_content).expect("write custom config");

        initialize_data_dir(temp.path()).expect("initialize data dir");

        let content = fs::read_to_string(&cfg_path).expect("read config");
        assert_eq!(content, custom_content);
    }

    #[test]
    fn resolve_relative_to_handles_both_forms() {
        assert_eq!(
            resolve_relative_to(Path::new("/base"), Path::new("/abs/path")),
            PathBuf::from("/abs/path")
        );
        assert_eq!(
            resolve_relative_to(Path::new("/base"), Path::new("sub")),
            PathBuf::from("/base/sub")
        );
    }
}
