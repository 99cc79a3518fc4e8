//! The export client: flattens a `ReceiptRecord` into one spreadsheet row and posts it to the
//! user's webhook.
//!
//! Whether the row was actually appended can only be known if the receiver says so. A completed
//! request whose reply does not confirm it is reported as `Delivery::Unknown`, never as success.

use crate::api::{Delivery, Webhook};
use crate::error::{ErrorType, IntoResult};
use crate::model::{Amount, Category, ReceiptRecord};
use crate::settings::Settings;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// The receiver code the user deploys as an Apps Script Web App on their spreadsheet.
pub const APPS_SCRIPT: &str = r##"function doPost(e) {
  var ss = SpreadsheetApp.getActiveSpreadsheet();
  var sheet = ss.getSheets()[0]; // Use the first sheet

  // Create headers if the sheet is new
  if (sheet.getLastRow() == 0) {
    sheet.appendRow(["Date", "Merchant", "Category", "Total", "Currency", "Items", "Logged At"]);
    sheet.getRange("A1:G1").setFontWeight("bold").setBackground("#f3f4f6");
  }

  try {
    var data = JSON.parse(e.postData.contents);
    sheet.appendRow([
      data.date || "",
      data.merchantName || "",
      data.category || "",
      data.totalAmount || 0,
      data.currency || "$",
      data.itemsList || "",
      data.timestamp || new Date().toLocaleString()
    ]);
    return ContentService.createTextOutput("Success").setMimeType(ContentService.MimeType.TEXT);
  } catch (err) {
    return ContentService.createTextOutput("Error: " + err.toString()).setMimeType(ContentService.MimeType.TEXT);
  }
}"##;

/// The steps for deploying `APPS_SCRIPT`.
pub const SETUP_STEPS: &str = "\
1. Inside your Google Sheet, go to Extensions > Apps Script.
2. Paste the code below, replacing anything already there.
3. Click Deploy > New Deployment, select Web App as the type and set 'Who has access' to Anyone.
4. Click Deploy and copy the Web App URL (NOT the editor URL). Save it with
   `receipt settings save --webhook <URL> --sheet <SHEET URL>`.";

/// The row sent for a receipt. Field names are what the receiver reads.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPayload {
    date: String,
    merchant_name: String,
    category: String,
    total_amount: Amount,
    currency: String,
    items_list: String,
    timestamp: String,
}

impl ExportPayload {
    /// Builds the row for `record`, stamped with `now`.
    ///
    /// The category is the one the user saw during review, so a label outside the closed set is
    /// sent as `Other`.
    pub fn new<Tz>(record: &ReceiptRecord, now: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        Self {
            date: record.date().to_string(),
            merchant_name: record.merchant_name().to_string(),
            category: record.display_category().to_string(),
            total_amount: record.total_amount(),
            currency: record.currency().to_string(),
            items_list: items_list(record),
            timestamp: timestamp(now),
        }
    }

    pub fn items_list(&self) -> &str {
        &self.items_list
    }

    pub fn category(&self) -> &str {
        &self.category
    }
}

/// The sentinel row sent by `test_connection`.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct TestPayload {
    date: String,
    merchant_name: &'static str,
    category: &'static str,
    total_amount: Amount,
    currency: &'static str,
    items_count: u32,
    timestamp: String,
}

impl TestPayload {
    fn new<Tz>(now: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        Self {
            date: now.format("%Y-%m-%d").to_string(),
            merchant_name: "TEST CONNECTION",
            category: "Settings Test",
            total_amount: Amount::ZERO,
            currency: "SYNC_OK",
            items_count: 0,
            timestamp: timestamp(now),
        }
    }
}

/// Flattens the items into `name (price)` joined by `, `.
pub fn items_list(record: &ReceiptRecord) -> String {
    record
        .items()
        .iter()
        .map(|item| format!("{} ({})", item.name(), item.price()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A human-readable local timestamp, e.g. `10/19/2025, 9:05:03 AM`.
fn timestamp<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    now.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}

/// Sends receipts and connection tests to the configured webhook.
pub struct Exporter {
    webhook: Box<dyn Webhook>,
    settle: Duration,
}

impl Exporter {
    /// `settle` is a pause after each completed export, so that the transition to "done" is not
    /// instantaneous. It is not needed for correctness.
    pub fn new(webhook: Box<dyn Webhook>, settle: Duration) -> Self {
        Self { webhook, settle }
    }

    /// Posts `record` to the webhook in `settings`.
    ///
    /// # Errors
    /// - A configuration error, before anything is sent, if the webhook is not usable.
    /// - An export error if the request could not be completed.
    ///
    /// A receiver that answers with an error is not an `Err`; it is `Delivery::Failed`.
    pub async fn export(&self, settings: &Settings, record: &ReceiptRecord) -> Result<Delivery> {
        let url = settings.webhook_for_use()?;
        let payload = ExportPayload::new(record, &Local::now());
        let body = serde_json::to_string(&payload)
            .context("Unable to serialize the export payload")
            .pub_result(ErrorType::Export)?;
        debug!("Export payload: {body}");

        let delivery = self
            .webhook
            .post(url, body)
            .await
            .context("Sync failed. Ensure you deployed the script as a Web App for 'Anyone'.")
            .pub_result(ErrorType::Export)?;

        if !self.settle.is_zero() && !matches!(delivery, Delivery::Failed(_)) {
            tokio::time::sleep(self.settle).await;
        }
        info!("Exported '{}': {delivery}", record.merchant_name());
        Ok(delivery)
    }

    /// Posts a sentinel row so the user can check the webhook before scanning.
    ///
    /// # Errors
    /// Same as `export`.
    pub async fn test_connection(&self, settings: &Settings) -> Result<Delivery> {
        let url = settings.webhook_for_use()?;
        let body = serde_json::to_string(&TestPayload::new(&Local::now()))
            .context("Unable to serialize the test payload")
            .pub_result(ErrorType::Export)?;
        self.webhook
            .post(url, body)
            .await
            .context("Network error. The webhook could not be reached.")
            .pub_result(ErrorType::Export)
    }
}

/// Returns `Some(category)` when the record's raw label differs from what will be exported.
pub fn category_correction(record: &ReceiptRecord) -> Option<Category> {
    if Category::is_known(record.category()) {
        None
    } else {
        Some(Category::Other)
    }
}
