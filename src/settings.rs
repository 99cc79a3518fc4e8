//! The settings store: the webhook and spreadsheet URLs the user has entered.
//!
//! These two strings are the only durable state. They are held in a `KeyValueStore` that is
//! passed in, so that nothing here reads or writes global state. `FileStore` keeps them in
//! `$RECEIPT_HOME/settings.json`; `MemoryStore` is for tests.

use crate::error::{ErrorType, IntoResult, Res};
use crate::{utils, Error, Result};
use anyhow::{bail, Context};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// The storage key for the webhook URL.
pub const WEBHOOK_KEY: &str = "webhookUrl";

/// The storage key for the spreadsheet URL.
pub const SHEET_KEY: &str = "sheetUrl";

/// Every webhook must start with this when it is used (it is not checked when it is saved).
pub const WEBHOOK_PREFIX: &str = "https://script.google.com";

/// A spreadsheet link contains this. Users often paste it where the webhook belongs.
const SPREADSHEET_PATTERN: &str = "docs.google.com/spreadsheets";

/// A durable string key-value store.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if it was never set.
    async fn get(&self, key: &str) -> Res<Option<String>>;

    /// Stores all `entries`, replacing existing values for the same keys.
    async fn set(&self, entries: &[(&str, &str)]) -> Res<()>;
}

/// A `KeyValueStore` backed by a single JSON object in a file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Res<BTreeMap<String, String>> {
        if !self.path.is_file() {
            return Ok(BTreeMap::new());
        }
        utils::deserialize(&self.path)
            .await
            .context("Unable to read the settings file")
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Res<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, entries: &[(&str, &str)]) -> Res<()> {
        let mut map = self.read_all().await?;
        for (key, value) in entries {
            map.insert(key.to_string(), value.to_string());
        }
        let json = serde_json::to_string_pretty(&map).context("Unable to serialize settings")?;
        utils::write_atomic(&self.path, json).await
    }
}

/// A `KeyValueStore` that lives only as long as the process. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    map: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Res<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        match self.map.lock() {
            Ok(guard) => Ok(guard),
            Err(_) => bail!("The in-memory settings store is poisoned"),
        }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Res<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, entries: &[(&str, &str)]) -> Res<()> {
        let mut map = self.lock()?;
        for (key, value) in entries {
            map.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

/// The two endpoint strings.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct Settings {
    #[serde(rename = "webhookUrl")]
    webhook: String,
    #[serde(rename = "sheetUrl")]
    sheet: String,
}

impl Settings {
    pub fn new(webhook: impl Into<String>, sheet: impl Into<String>) -> Self {
        Self {
            webhook: webhook.into(),
            sheet: sheet.into(),
        }
    }

    pub fn webhook(&self) -> &str {
        &self.webhook
    }

    pub fn sheet(&self) -> &str {
        &self.sheet
    }

    /// Returns the webhook if it is usable for an export, otherwise a configuration error.
    pub fn webhook_for_use(&self) -> Result<&str> {
        let webhook = self.webhook.trim();
        if webhook.is_empty() {
            return Err(Error::msg(
                ErrorType::Configuration,
                "No webhook URL is set. Save the Web App URL from the Apps Script 'Deploy' menu \
                first.",
            ));
        }
        if !webhook.starts_with(WEBHOOK_PREFIX) {
            return Err(Error::msg(
                ErrorType::Configuration,
                format!("Invalid webhook URL. It should start with '{WEBHOOK_PREFIX}/macros/s/...'"),
            ));
        }
        Ok(webhook)
    }

    /// True when exports can be attempted.
    pub fn is_configured(&self) -> bool {
        self.webhook_for_use().is_ok()
    }
}

/// Loads and saves `Settings` against an injected `KeyValueStore`.
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    pub fn new(store: impl KeyValueStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// Trims both values and persists them.
    ///
    /// # Errors
    /// - A configuration error, without touching the store, if the webhook looks like a
    ///   spreadsheet link.
    /// - An I/O error if the store cannot be written.
    pub async fn save(&self, webhook: &str, sheet: &str) -> Result<Settings> {
        let webhook = webhook.trim();
        let sheet = sheet.trim();
        if webhook.contains(SPREADSHEET_PATTERN) {
            return Err(Error::msg(
                ErrorType::Configuration,
                "You pasted a Spreadsheet URL into the webhook field. You need the Web App URL \
                from the 'Deploy' menu.",
            ));
        }
        if !webhook.is_empty() {
            let _ = url::Url::parse(webhook)
                .with_context(|| format!("The webhook '{webhook}' is not a URL"))
                .pub_result(ErrorType::Configuration)?;
        }
        self.store
            .set(&[(WEBHOOK_KEY, webhook), (SHEET_KEY, sheet)])
            .await
            .pub_result(ErrorType::Io)?;
        info!("Settings saved");
        Ok(Settings::new(webhook, sheet))
    }

    /// Returns the persisted settings, with empty strings for values never saved.
    pub async fn load(&self) -> Result<Settings> {
        let webhook = self.store.get(WEBHOOK_KEY).await.pub_result(ErrorType::Io)?;
        let sheet = self.store.get(SHEET_KEY).await.pub_result(ErrorType::Io)?;
        debug!(
            "Loaded settings: webhook set = {}, sheet set = {}",
            webhook.is_some(),
            sheet.is_some()
        );
        Ok(Settings::new(
            webhook.unwrap_or_default(),
            sheet.unwrap_or_default(),
        ))
    }
}
