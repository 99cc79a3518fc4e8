//! In-memory implementations of `Extractor` and `Webhook`.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without calling Gemini or a webhook (see `Mode::Test`).

use crate::api::{parse_response_text, Delivery, Extractor, Webhook};
use crate::capture::CapturedImage;
use crate::error::Res;
use crate::model::ReceiptRecord;
use anyhow::{bail, Context};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

/// A conforming model response, as Gemini would return it in the candidate text.
pub const SAMPLE_RESPONSE: &str = r#"{
  "merchantName": "Cafe X",
  "date": "2025-10-19",
  "totalAmount": 12.5,
  "currency": "$",
  "category": "Dining",
  "items": [
    { "name": "Coffee", "quantity": 1, "price": 4.5 },
    { "name": "Bagel", "quantity": 1, "price": 3.0 },
    { "name": "Orange Juice", "quantity": 1, "price": 5 }
  ]
}"#;

/// An `Extractor` that returns a canned response text, or fails as if the network were down.
#[derive(Debug, Clone)]
pub struct TestExtractor {
    response: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl TestExtractor {
    /// An extractor whose model "returns" `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            response: Some(text.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// An extractor whose request never completes successfully.
    pub fn unreachable() -> Self {
        Self {
            response: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many times `analyze` was called. Shared between clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for TestExtractor {
    fn default() -> Self {
        Self::new(SAMPLE_RESPONSE)
    }
}

#[async_trait::async_trait]
impl Extractor for TestExtractor {
    async fn analyze(&self, image: &CapturedImage) -> Res<ReceiptRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        info!("Test extractor received {image:?}");
        match &self.response {
            Some(text) => parse_response_text(text),
            None => bail!("Failed to send the request to the inference endpoint"),
        }
    }
}

/// A `Webhook` that records every body it is given and replies with a fixed `Delivery`.
#[derive(Debug, Clone)]
pub struct TestWebhook {
    reply: Option<Delivery>,
    posts: Arc<Mutex<Vec<(String, String)>>>,
}

impl TestWebhook {
    /// A webhook that replies with `reply`.
    pub fn new(reply: Delivery) -> Self {
        Self {
            reply: Some(reply),
            posts: Arc::default(),
        }
    }

    /// A webhook that cannot be reached.
    pub fn unreachable() -> Self {
        Self {
            reply: None,
            posts: Arc::default(),
        }
    }

    /// Every `(url, body)` posted so far, including attempts to an unreachable webhook. Shared
    /// between clones.
    pub fn posts(&self) -> Vec<(String, String)> {
        self.posts
            .lock()
            .map(|posts| posts.clone())
            .unwrap_or_default()
    }
}

impl Default for TestWebhook {
    fn default() -> Self {
        Self::new(Delivery::Ack)
    }
}

#[async_trait::async_trait]
impl Webhook for TestWebhook {
    async fn post(&self, url: &str, body: String) -> Res<Delivery> {
        info!("Test webhook received {} bytes", body.len());
        match self.posts.lock() {
            Ok(mut posts) => posts.push((url.to_string(), body)),
            Err(_) => bail!("The test webhook is poisoned"),
        }
        self.reply
            .clone()
            .context("Network error while sending to the webhook")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extractor_counts_calls() {
        let extractor = TestExtractor::default();
        let image = CapturedImage::from_jpeg(&[0xFF, 0xD8]).unwrap();
        let record = extractor.analyze(&image).await.unwrap();
        assert_eq!(record.merchant_name(), "Cafe X");
        assert_eq!(extractor.clone().calls(), 1);
        assert!(TestExtractor::unreachable().analyze(&image).await.is_err());
    }

    #[tokio::test]
    async fn test_webhook_records_posts() {
        let webhook = TestWebhook::new(Delivery::Unknown);
        let delivery = webhook.post("https://x", "body".to_string()).await.unwrap();
        assert_eq!(delivery, Delivery::Unknown);
        assert_eq!(
            webhook.posts(),
            vec![("https://x".to_string(), "body".to_string())]
        );

        let unreachable = TestWebhook::unreachable();
        assert!(unreachable.post("https://x", "b".to_string()).await.is_err());
        assert_eq!(unreachable.posts().len(), 1);
    }
}
