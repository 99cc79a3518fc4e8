//! Command handlers for the receipt CLI.
//!
//! This module contains implementations for all CLI subcommands.

mod init;
mod scan;
mod settings;
mod setup;

use crate::api::{self, Mode};
use crate::controller::Controller;
use crate::export::Exporter;
use crate::settings::{FileStore, SettingsStore};
use crate::{Config, Result};
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info};

pub use init::init;
pub use scan::{analyze, scan, ScanReport};
pub use settings::{settings_save, settings_show, test_connection};
pub use setup::{setup, Setup};

/// The output type for a command. This allows the command to return a consistent message and,
/// optionally, structured data.
#[derive(Debug, Clone, Serialize)]
pub struct Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// A message that can be printed to the user regarding the outcome of the command execution.
    message: String,

    /// Any structured data that needs to be output from the call.
    structure: Option<T>,
}

impl<T, S> From<S> for Out<T>
where
    T: Debug + Clone + Serialize,
    S: Into<String>,
{
    fn from(value: S) -> Self {
        Out::new_message(value)
    }
}

impl<T> Out<T>
where
    T: Serialize + Clone + Debug,
{
    /// Create a new `Out` object that has `Some(structure)`.
    pub fn new<S>(message: S, structure: T) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: Some(structure),
        }
    }

    /// Create a new `Out` object that has `None` for `structure`.
    pub fn new_message<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            structure: None,
        }
    }

    /// Get the `message`.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the structured data stored in `structure`.
    pub fn structure(&self) -> Option<&T> {
        self.structure.as_ref()
    }

    /// Print the message to `info!` and the structured data (if it exists) as JSON to `debug!`.
    pub fn print(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                debug!("Command output:\n\n{json}\n\n");
            }
        }
    }

    /// Like `print`, but the structured data goes to stdout so that it can be piped.
    pub fn print_json(&self) {
        info!("{}", self.message);
        if let Some(structure) = self.structure() {
            if let Ok(json) = serde_json::to_string_pretty(structure) {
                println!("{json}");
            }
        }
    }
}

fn settings_store(config: &Config) -> SettingsStore {
    SettingsStore::new(FileStore::new(config.settings_path()))
}

/// Wires a controller to the clients selected by `mode`.
fn controller(config: &Config, mode: Mode) -> Result<Controller> {
    debug!("Building the controller in {mode} mode");
    Ok(Controller::new(
        settings_store(config),
        api::extractor(config, mode)?,
        Exporter::new(api::webhook(mode), config.export_settle()),
    ))
}
