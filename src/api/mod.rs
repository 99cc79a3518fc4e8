//! Clients for the two remote services: the inference endpoint that extracts a receipt and the
//! webhook that receives the exported row.
//!
//! Both are traits so that the whole app can run against in-memory implementations, see `Mode`.

mod gemini;
mod schema;
mod test_client;
mod webhook;

use crate::capture::CapturedImage;
use crate::error::{ErrorType, IntoResult, Res};
use crate::model::ReceiptRecord;
use crate::{Config, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub use gemini::{parse_response_text, GeminiExtractor};
pub use schema::{response_schema, INSTRUCTION};
pub use test_client::{TestExtractor, TestWebhook, SAMPLE_RESPONSE};
pub use webhook::HttpWebhook;

/// When this environment variable is set and non-empty, the app runs in `Mode::Test`.
pub const TEST_MODE_ENV: &str = "RECEIPT_SYNC_IN_TEST_MODE";

/// Selects real network clients or in-memory ones.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Talk to Gemini and the configured webhook.
    #[default]
    Live,
    /// Use `TestExtractor` and `TestWebhook`. Nothing leaves the machine.
    Test,
}

serde_plain::derive_display_from_serialize!(Mode);

impl Mode {
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Test,
            _ => Mode::Live,
        }
    }
}

/// Turns an image into a structured receipt.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    /// Makes a single request. Any failure, including an empty or non-conforming response, is an
    /// error; a partial record is never returned.
    async fn analyze(&self, image: &CapturedImage) -> Res<ReceiptRecord>;
}

/// What is known about a webhook delivery once the request has completed.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "delivery", content = "reason")]
pub enum Delivery {
    /// The receiver confirmed that it stored the row.
    Ack,
    /// The request completed but the receiver's answer does not confirm anything. The row may or
    /// may not have been appended.
    Unknown,
    /// The receiver answered with an error.
    Failed(String),
}

impl Display for Delivery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Delivery::Ack => f.write_str("acknowledged"),
            Delivery::Unknown => f.write_str("sent, unconfirmed"),
            Delivery::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Posts a text body to a URL.
#[async_trait::async_trait]
pub trait Webhook: Send + Sync {
    /// Returns `Err` only for transport failures, i.e. when the request could not be completed.
    async fn post(&self, url: &str, body: String) -> Res<Delivery>;
}

/// Creates the extractor for `mode`.
///
/// # Errors
/// In `Mode::Live`, a configuration error if the API key is not available.
pub fn extractor(config: &Config, mode: Mode) -> Result<Box<dyn Extractor>> {
    Ok(match mode {
        Mode::Live => {
            let api_key = config.api_key().pub_result(ErrorType::Configuration)?;
            Box::new(GeminiExtractor::new(
                config.api_base(),
                config.model(),
                api_key,
            ))
        }
        Mode::Test => Box::new(TestExtractor::default()),
    })
}

/// Creates the webhook transport for `mode`.
pub fn webhook(mode: Mode) -> Box<dyn Webhook> {
    match mode {
        Mode::Live => Box::new(HttpWebhook::new()),
        Mode::Test => Box::new(TestWebhook::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_serialization() {
        let json = serde_json::to_string(&Delivery::Failed("nope".into())).unwrap();
        assert_eq!(json, r#"{"delivery":"failed","reason":"nope"}"#);
        let json = serde_json::to_string(&Delivery::Ack).unwrap();
        assert_eq!(json, r#"{"delivery":"ack"}"#);
    }

    #[test]
    fn test_extractor_in_live_mode_needs_key() {
        let config = Config::for_test("/nonexistent");
        std::env::remove_var(config.api_key_env());
        let err = extractor(&config, Mode::Live).err().unwrap();
        assert_eq!(err.kind(), ErrorType::Configuration);
        assert!(extractor(&config, Mode::Test).is_ok());
    }
}
