use log::debug;
use reqwest::Client;

use crate::error::{DataStoryError, Result};
use crate::llm::types::*;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Build a client from `GEMINI_API_KEY`. A missing key is a
    /// configuration error, detected here before any network call.
    pub fn from_env() -> Result<Self> {
        match std::env::var("GEMINI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key)),
            _ => Err(DataStoryError::MissingApiKey),
        }
    }

    pub(crate) async fn generate_content(
        &self,
        model: &str,
        prompt: &str,
        config: GenerationConfig,
    ) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let payload = GenerateContentRequest {
            contents: vec![Content::user(prompt)],
            generation_config: config,
        };

        debug!("Requesting {} completion ({} prompt chars)", model, prompt.len());

        let res = self.client.post(&url).json(&payload).send().await?;
        let status = res.status();

        if !status.is_success() {
            let err_text = res.text().await.unwrap_or_default();
            return Err(map_api_error(status.as_u16(), err_text));
        }

        let body: GenerateContentResponse = res.json().await?;

        let text = body
            .candidates
            .and_then(|mut candidates| {
                if candidates.is_empty() {
                    None
                } else {
                    Some(candidates.remove(0))
                }
            })
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| {
                DataStoryError::MalformedResponse("no candidates in reply".to_string())
            })?;

        Ok(text)
    }
}

/// Map transport failures onto the user-facing error categories:
/// rejected key, exhausted quota, or a generic API error carrying the
/// upstream status and message.
fn map_api_error(status: u16, message: String) -> DataStoryError {
    let lower = message.to_lowercase();
    if status == 401 || status == 403 || lower.contains("api key not valid") {
        return DataStoryError::InvalidApiKey;
    }
    if status == 429 || lower.contains("quota") || lower.contains("resource_exhausted") {
        return DataStoryError::QuotaExceeded;
    }
    DataStoryError::Api { status, message }
}
