use log::{debug, info, warn};

use crate::analysis::AnalysisResponse;
use crate::decode::{decode, FileKind};
use crate::error::Result;
use crate::llm::DataAnalyst;
use crate::normalize::NormalizerConfig;
use crate::prepare_dataset;
use crate::record::{AggregatedRecord, Dataset, RawRecord};
use crate::store::{AnalysisStore, StoredAnalysis};

/// The result of one pipeline run, held for the session.
#[derive(Debug, Clone)]
pub struct StoryOutcome {
    pub file_name: String,
    pub records: Vec<AggregatedRecord>,
    pub analysis: AnalysisResponse,
}

/// The fixed upload flow: decode → aggregate → analyze → best-effort
/// history write. Each run owns its record sets; a new upload is a
/// fresh, independent run.
pub struct StoryPipeline<S: AnalysisStore> {
    analyst: DataAnalyst,
    store: Option<S>,
    config: NormalizerConfig,
}

impl<S: AnalysisStore> StoryPipeline<S> {
    pub fn new(analyst: DataAnalyst) -> Self {
        Self {
            analyst,
            store: None,
            config: NormalizerConfig::default(),
        }
    }

    pub fn with_store(mut self, store: S) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_config(mut self, config: NormalizerConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn run(&self, file_name: &str, bytes: &[u8], kind: FileKind) -> Result<StoryOutcome> {
        info!("Processing upload {}", file_name);

        let dataset = decode(bytes, kind)?;
        let records = prepare_dataset(&dataset, &self.config)?;
        debug!(
            "{}: {} rows aggregated into {} records",
            file_name,
            dataset.rows.len(),
            records.len()
        );

        let analysis = self.analyst.analyze(&records, file_name).await?;

        // History writes never fail the already-successful analysis
        if let Some(store) = &self.store {
            if let Err(err) = self.persist(store, file_name, &dataset, &analysis).await {
                warn!("Failed to persist analysis for {}: {}", file_name, err);
            }
        }

        Ok(StoryOutcome {
            file_name: file_name.to_string(),
            records,
            analysis,
        })
    }

    /// Repeat the analysis of a stored history entry from its raw
    /// pre-aggregation rows. Aggregation determinism makes the data
    /// half of this idempotent; the entry is not re-persisted.
    pub async fn reanalyze(&self, entry: &StoredAnalysis) -> Result<StoryOutcome> {
        info!("Re-analyzing history entry {} ({})", entry.id, entry.filename);

        let rows: Vec<RawRecord> = serde_json::from_value(entry.data.clone())?;
        let headers = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        let dataset = Dataset { headers, rows };

        let records = prepare_dataset(&dataset, &self.config)?;
        let analysis = self.analyst.analyze(&records, &entry.filename).await?;

        Ok(StoryOutcome {
            file_name: entry.filename.clone(),
            records,
            analysis,
        })
    }

    /// All stored analyses, newest first. Empty when no store is
    /// attached.
    pub async fn history(&self) -> Result<Vec<StoredAnalysis>> {
        match &self.store {
            Some(store) => store.list_analyses().await,
            None => Ok(Vec::new()),
        }
    }

    /// Ask a free-text question about an already-aggregated dataset.
    pub async fn ask(
        &self,
        records: &[AggregatedRecord],
        file_name: &str,
        question: &str,
    ) -> Result<String> {
        self.analyst.ask(records, file_name, question).await
    }

    async fn persist(
        &self,
        store: &S,
        file_name: &str,
        dataset: &Dataset,
        analysis: &AnalysisResponse,
    ) -> Result<()> {
        let raw = serde_json::to_value(&dataset.rows)?;
        let insights = serde_json::to_string(analysis)?;
        store.insert_analysis(file_name, &raw, &insights).await
    }
}
