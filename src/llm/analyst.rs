use log::{debug, info};

use crate::analysis::{
    build_analysis_prompt, build_chat_prompt, fill_comparison_gaps, parse_analysis_response,
    strip_code_fence, AnalysisResponse, DEFAULT_ANALYSIS_MODEL,
};
use crate::error::Result;
use crate::llm::client::GeminiClient;
use crate::llm::types::GenerationConfig;
use crate::record::AggregatedRecord;

/// The orchestrator for the two LLM modes over an aggregated dataset:
/// structured dashboard analysis and free-text questions.
pub struct DataAnalyst {
    client: GeminiClient,
    model: String,
}

impl DataAnalyst {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Default-model analyst from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(GeminiClient::from_env()?, DEFAULT_ANALYSIS_MODEL))
    }

    /// Request the structured dashboard payload for a dataset. The
    /// reply is validated before it is returned; a reply that fails
    /// the structure gate fails the request.
    pub async fn analyze(
        &self,
        records: &[AggregatedRecord],
        file_name: &str,
    ) -> Result<AnalysisResponse> {
        info!("Analyzing {} ({} aggregated records)", file_name, records.len());

        let prompt = build_analysis_prompt(records, file_name)?;
        let raw = self
            .client
            .generate_content(&self.model, &prompt, GenerationConfig::json())
            .await?;

        let analysis = parse_analysis_response(&raw)?;
        debug!("Analysis for {} passed structure validation", file_name);
        Ok(analysis)
    }

    /// Ask a free-text question about the dataset. The comparison
    /// window is zero-filled first so every region is visible for both
    /// periods; the reply is plain text.
    pub async fn ask(
        &self,
        records: &[AggregatedRecord],
        file_name: &str,
        question: &str,
    ) -> Result<String> {
        let filled = fill_comparison_gaps(records);
        debug!(
            "Chat over {}: {} records after zero-fill",
            file_name,
            filled.len()
        );

        let prompt = build_chat_prompt(&filled, file_name, question)?;
        let raw = self
            .client
            .generate_content(&self.model, &prompt, GenerationConfig::text())
            .await?;

        Ok(strip_code_fence(&raw))
    }
}
