use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::PipelineError;
use super::auth::TokenSource;
use super::fetch::ResilientClient;

/// One prescription line as the structured-extraction service reports it:
/// a medicine name plus its raw `"D D D"` dosage triplet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DosageEntry {
    pub medicine_name: String,
    pub dosage_code: String,
}

#[derive(Debug, Deserialize)]
struct ExtractedText {
    extracted_text: String,
}

/// Client for the handwriting/OCR service: image in, raw text out. The
/// recognition itself is entirely upstream; this side only carries the
/// payload and the auth header.
pub struct TextExtractionClient {
    fetch: Arc<ResilientClient>,
    auth: Arc<dyn TokenSource>,
    endpoint: String,
}

impl TextExtractionClient {
    pub fn new(fetch: Arc<ResilientClient>, auth: Arc<dyn TokenSource>, endpoint: String) -> Self {
        Self {
            fetch,
            auth,
            endpoint,
        }
    }

    pub async fn extract_text(&self, image_base64: &str) -> Result<String, PipelineError> {
        let token = self.auth.bearer_token()?;
        let body = json!({ "image_base64": image_base64 });

        let response: ExtractedText = self
            .fetch
            .post_json(&self.endpoint, &body, Some(&token))
            .await?;
        Ok(response.extracted_text)
    }
}

/// Client for the structured dosage extraction service: free-form
/// prescription text in, ordered `(medicine, dosage code)` pairs out. An
/// empty list is a valid answer, not a failure.
pub struct DosageExtractionClient {
    fetch: Arc<ResilientClient>,
    auth: Arc<dyn TokenSource>,
    endpoint: String,
}

impl DosageExtractionClient {
    pub fn new(fetch: Arc<ResilientClient>, auth: Arc<dyn TokenSource>, endpoint: String) -> Self {
        Self {
            fetch,
            auth,
            endpoint,
        }
    }

    pub async fn extract_dosages(&self, raw_text: &str) -> Result<Vec<DosageEntry>, PipelineError> {
        let token = self.auth.bearer_token()?;
        let body = json!({ "rawText": raw_text });

        let entries = self
            .fetch
            .post_json(&self.endpoint, &body, Some(&token))
            .await?;
        Ok(entries)
    }
}
