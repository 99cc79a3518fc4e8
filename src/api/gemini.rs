//! Implements the `Extractor` trait using the Gemini `generateContent` REST endpoint.

use crate::api::schema::{response_schema, INSTRUCTION};
use crate::api::Extractor;
use crate::capture::CapturedImage;
use crate::error::Res;
use crate::model::ReceiptRecord;
use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, trace};

/// Sends one `generateContent` request per image and parses the JSON text it returns.
#[derive(Debug, Clone)]
pub struct GeminiExtractor {
    api_base: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiExtractor {
    pub fn new(
        api_base: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            model: model.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }
}

/// The request body: the image, the instruction, and the output schema.
fn request_body(image: &CapturedImage) -> serde_json::Value {
    json!({
        "contents": [{
            "parts": [
                { "inlineData": { "mimeType": image.mime_type(), "data": image.base64() } },
                { "text": INSTRUCTION }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema()
        }
    })
}

#[async_trait::async_trait]
impl Extractor for GeminiExtractor {
    async fn analyze(&self, image: &CapturedImage) -> Res<ReceiptRecord> {
        info!("Analyzing receipt with {}", self.model);
        let response = self
            .client
            .post(self.url())
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body(image))
            .send()
            .await
            .context("Failed to send the request to the inference endpoint")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read the inference response")?;
        trace!("Inference response ({status}): {body}");

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            bail!("The inference endpoint returned {status}: {message}");
        }

        let response: GenerateContentResponse =
            serde_json::from_str(&body).context("Failed to parse the inference response")?;
        let text = response.text().context("No data returned from AI")?;
        parse_response_text(&text)
    }
}

/// Parses the model's JSON text into a `ReceiptRecord`.
///
/// # Errors
/// - The text is empty.
/// - The text is not JSON, or is JSON of the wrong shape (a missing required field).
/// - The total or an item price is negative.
pub fn parse_response_text(text: &str) -> Res<ReceiptRecord> {
    let text = text.trim();
    if text.is_empty() {
        bail!("No data returned from AI");
    }
    let record: ReceiptRecord =
        serde_json::from_str(text).context("The AI response is not a valid receipt")?;
    record
        .validate()
        .context("The AI response is not a valid receipt")?;
    debug!(
        "Extracted {} items from '{}'",
        record.items().len(),
        record.merchant_name()
    );
    Ok(record)
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// The concatenated text parts of the first candidate, `None` if there is no text.
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}
