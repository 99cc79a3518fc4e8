//! Configuration file handling for receipt-sync.
//!
//! The configuration file is stored at `$RECEIPT_HOME/config.json` and contains settings for
//! the extraction model and the export client. It is optional: when it is missing the defaults are
//! used. The user's endpoint settings (webhook and sheet URLs) are not stored here, they live in
//! the settings store, see `crate::settings`.

use crate::error::{ErrorType, IntoResult, Res};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_NAME: &str = "receipt-sync";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const SETTINGS_JSON: &str = "settings.json";
const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
const DEFAULT_EXPORT_SETTLE_MS: u64 = 2000;

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$RECEIPT_HOME` and from there it loads `$RECEIPT_HOME/config.json`, if present. It
/// provides paths to other items that are expected in a certain location within the home
/// directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    settings_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the data directory and an initial `config.json` with default settings.
    ///
    /// # Errors
    /// - Returns an error if a `config.json` already exists in `dir`.
    /// - Returns an error if any file operations fail.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::create_inner(dir.into())
            .await
            .pub_result(ErrorType::Configuration)
    }

    async fn create_inner(dir: PathBuf) -> Res<Self> {
        let root = prepare_root(dir).await?;
        let config_path = root.join(CONFIG_JSON);
        if config_path.is_file() {
            bail!(
                "A config file already exists at '{}', refusing to overwrite it",
                config_path.display()
            )
        }
        let config_file = ConfigFile::default();
        config_file.save(&config_path).await?;
        Ok(Self::new(root, config_file))
    }

    /// This will
    /// - create `receipt_home` if it does not exist
    /// - load `config.json` if it exists, otherwise use the defaults
    /// - return the loaded configuration object
    pub async fn load(receipt_home: impl Into<PathBuf>) -> Result<Self> {
        Self::load_inner(receipt_home.into())
            .await
            .pub_result(ErrorType::Configuration)
    }

    async fn load_inner(receipt_home: PathBuf) -> Res<Self> {
        let root = prepare_root(receipt_home).await?;
        let config_path = root.join(CONFIG_JSON);
        let config_file = if config_path.is_file() {
            ConfigFile::load(&config_path).await?
        } else {
            tracing::debug!(
                "No config file at '{}', using defaults",
                config_path.display()
            );
            ConfigFile::default()
        };
        Ok(Self::new(root, config_file))
    }

    fn new(root: PathBuf, config_file: ConfigFile) -> Self {
        Self {
            config_path: root.join(CONFIG_JSON),
            settings_path: root.join(SETTINGS_JSON),
            root,
            config_file,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Where the key-value settings (webhook and sheet URLs) are persisted.
    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    pub fn model(&self) -> &str {
        &self.config_file.model
    }

    pub fn api_base(&self) -> &str {
        &self.config_file.api_base
    }

    pub fn api_key_env(&self) -> &str {
        &self.config_file.api_key_env
    }

    /// Reads the inference API key from the environment variable named by `api_key_env`.
    pub(crate) fn api_key(&self) -> Res<String> {
        let name = self.api_key_env();
        match std::env::var(name) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => bail!("The API key environment variable {name} is not set"),
        }
    }

    /// How long to wait after a webhook POST completes before declaring the export done.
    pub fn export_settle(&self) -> Duration {
        Duration::from_millis(self.config_file.export_settle_ms)
    }
}

async fn prepare_root(maybe_relative: PathBuf) -> Res<PathBuf> {
    utils::make_dir(&maybe_relative)
        .await
        .context("Unable to create the receipt home directory")?;
    utils::canonicalize(&maybe_relative).await
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "receipt-sync",
///   "config_version": 1,
///   "model": "gemini-3-flash-preview",
///   "api_base": "https://generativelanguage.googleapis.com",
///   "api_key_env": "GEMINI_API_KEY",
///   "export_settle_ms": 2000
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "receipt-sync"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// The Gemini model used for extraction
    #[serde(default = "default_model")]
    model: String,

    /// Scheme and host of the inference API
    #[serde(default = "default_api_base")]
    api_base: String,

    /// Name of the environment variable that holds the API key
    #[serde(default = "default_api_key_env")]
    api_key_env: String,

    /// Milliseconds to pause after an export completes
    #[serde(default = "default_export_settle_ms")]
    export_settle_ms: u64,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_export_settle_ms() -> u64 {
    DEFAULT_EXPORT_SETTLE_MS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            model: default_model(),
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
            export_settle_ms: default_export_settle_ms(),
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if it belongs to another app.
    async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .context("Failed to load the config file")?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.config_version <= CONFIG_VERSION,
            "Config version {} is unsupported. Is a newer version of receipt-sync available?",
            config.config_version
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Res<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}

#[cfg(test)]
impl Config {
    /// A config for tests, with no settle delay.
    pub(crate) fn for_test(root: impl Into<PathBuf>) -> Self {
        let mut config_file = ConfigFile::default();
        config_file.export_settle_ms = 0;
        config_file.api_key_env = "RECEIPT_SYNC_TEST_API_KEY".to_string();
        Self::new(root.into(), config_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_create() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("receipts");

        let config = Config::create(&home_dir).await.unwrap();

        assert!(config.root().is_dir());
        assert!(config.config_path().is_file());
        assert_eq!(config.model(), DEFAULT_MODEL);
        assert_eq!(config.export_settle(), Duration::from_millis(2000));
        assert_eq!(config.settings_path(), config.root().join(SETTINGS_JSON));
    }

    #[tokio::test]
    async fn test_config_create_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        Config::create(dir.path()).await.unwrap();
        let err = Config::create(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_config_load_without_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("new_home");
        let config = Config::load(&home_dir).await.unwrap();
        assert!(home_dir.is_dir());
        assert!(!config.config_path().exists());
        assert_eq!(config.api_base(), DEFAULT_API_BASE);
        assert_eq!(config.api_key_env(), DEFAULT_API_KEY_ENV);
    }

    #[tokio::test]
    async fn test_config_load_with_minimal_config() {
        let dir = TempDir::new().unwrap();
        let json = r#"{
            "app_name": "receipt-sync",
            "config_version": 1,
            "model": "gemini-2.0-flash",
            "export_settle_ms": 250
        }"#;
        utils::write(dir.path().join(CONFIG_JSON), json)
            .await
            .unwrap();

        let config = Config::load(dir.path()).await.unwrap();
        assert_eq!(config.model(), "gemini-2.0-flash");
        assert_eq!(config.export_settle(), Duration::from_millis(250));
        assert_eq!(config.api_base(), DEFAULT_API_BASE);
    }

    #[tokio::test]
    async fn test_config_load_invalid_app_name() {
        let dir = TempDir::new().unwrap();
        let json = r#"{"app_name": "other-app", "config_version": 1}"#;
        utils::write(dir.path().join(CONFIG_JSON), json)
            .await
            .unwrap();

        let result = Config::load(dir.path()).await;
        assert!(result.is_err());
        assert!(format!("{:#}", result.unwrap_err()).contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_load_newer_version() {
        let dir = TempDir::new().unwrap();
        let json = r#"{"app_name": "receipt-sync", "config_version": 99}"#;
        utils::write(dir.path().join(CONFIG_JSON), json)
            .await
            .unwrap();
        assert!(Config::load(dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("file.json");
        let original = ConfigFile {
            model: "some-model".to_string(),
            export_settle_ms: 10,
            ..ConfigFile::default()
        };
        original.save(&path).await.unwrap();
        let read = ConfigFile::load(&path).await.unwrap();
        assert_eq!(original, read);
    }

    #[test]
    fn test_api_key_missing() {
        let config = Config::for_test("/nonexistent");
        std::env::remove_var("RECEIPT_SYNC_TEST_API_KEY");
        let err = config.api_key().unwrap_err();
        assert!(err.to_string().contains("RECEIPT_SYNC_TEST_API_KEY"));
    }
}
