//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::model::{Amount, ReceiptItem, ReceiptRecord};
use crate::Config;
use rust_decimal::Decimal;
use std::path::PathBuf;
use tempfile::TempDir;

/// A webhook URL that passes validation.
pub const WEBHOOK: &str = "https://script.google.com/macros/s/AKfycbx123/exec";

/// A spreadsheet link, as the user would paste it into the sheet field.
pub const SHEET: &str = "https://docs.google.com/spreadsheets/d/1a7Km9FxQwRbPt82JvN4LzYpH5Oc/edit";

/// The record that `crate::api::SAMPLE_RESPONSE` parses to.
pub fn sample_record() -> ReceiptRecord {
    let one = Amount::new(Decimal::ONE);
    ReceiptRecord::new(
        "Cafe X",
        "2025-10-19",
        Amount::new(Decimal::new(125, 1)),
        "$",
        "Dining",
        vec![
            ReceiptItem::new("Coffee", one, Amount::new(Decimal::new(45, 1))),
            ReceiptItem::new("Bagel", one, Amount::new(Decimal::new(3, 0))),
            ReceiptItem::new("Orange Juice", one, Amount::new(Decimal::new(5, 0))),
        ],
    )
}

/// A JPEG written to disk for `FileCamera`.
pub const TINY_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9];

/// Test environment with a receipt home directory and its Config.
/// Holds TempDir to keep the directory alive for the duration of the test.
pub struct TestEnv {
    temp_dir: TempDir,
    config: Config,
}

impl TestEnv {
    /// Creates a test environment with an initialized home directory.
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("receipts");
        Config::create(&root).await.unwrap();
        let config = Config::for_test(&root);
        Self { temp_dir, config }
    }

    /// Returns a clone of the Config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    /// Writes `TINY_JPEG` outside of the home directory and returns its path.
    pub fn image(&self) -> PathBuf {
        let path = self.temp_dir.path().join("receipt.jpg");
        std::fs::write(&path, TINY_JPEG).unwrap();
        path
    }
}
