//! # Data Story Builder
//!
//! A library for turning spreadsheet exports (CSV/XLSX) into a
//! canonical aggregated monthly record set and an AI-generated
//! dashboard story.
//!
//! ## Core Concepts
//!
//! - **Raw records**: header-keyed rows decoded from the upload, with
//!   every cell typed as a closed variant
//! - **Normalization**: resolver chains map inconsistent column names
//!   and formats onto three semantic fields (period, category, measure)
//! - **Aggregation**: one summed bucket per (month, region) pair,
//!   order-independent and deterministic
//! - **Analysis**: a bounded sample of the aggregated set goes to
//!   Gemini; the structured reply is validated before anyone sees it
//!
//! ## Example
//!
//! ```rust
//! use data_story_builder::*;
//!
//! let csv = "Datum,Region,Umsatz\n2025-02-10,Nord,1500\n2025-02-25,Nord,300\n";
//! let dataset = decode_csv(csv).unwrap();
//! let records = prepare_dataset(&dataset, &NormalizerConfig::default()).unwrap();
//!
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].month, "2025-02");
//! assert_eq!(records[0].revenue, 1800.0);
//! ```
//!
//! With the `gemini` feature, [`pipeline::StoryPipeline`] runs the
//! full upload flow against the live API and a history store.

pub mod aggregate;
pub mod analysis;
pub mod chat;
pub mod decode;
pub mod error;
pub mod normalize;
pub mod record;
pub mod store;

#[cfg(feature = "gemini")]
pub mod llm;

#[cfg(feature = "gemini")]
pub mod pipeline;

pub use aggregate::aggregate;
pub use analysis::*;
pub use chat::{append_exchange, build_page_prompt, ChatRole, ChatTurn};
pub use decode::{decode, decode_csv, decode_path, decode_xlsx, FileKind};
pub use error::{DataStoryError, Result};
pub use normalize::{normalize, resolve_period, NormalizerConfig};
pub use record::*;
pub use store::*;

use log::{debug, info};

/// Normalize and aggregate decoded rows into the monthly summary.
/// Rows whose period cannot be resolved are dropped; everything else
/// lands in exactly one (month, region) bucket.
pub fn build_monthly_summary(
    rows: &[RawRecord],
    config: &NormalizerConfig,
) -> Vec<AggregatedRecord> {
    let summary = aggregate(rows.iter().filter_map(|row| normalize(row, config)));
    debug!(
        "Summarized {} rows into {} (month, region) buckets",
        rows.len(),
        summary.len()
    );
    summary
}

/// The pipeline's data stage: reject an empty dataset (the "no data"
/// terminal state) and aggregate the rest. Callers invoke this before
/// any model call so zero-row uploads never reach the network.
pub fn prepare_dataset(
    dataset: &Dataset,
    config: &NormalizerConfig,
) -> Result<Vec<AggregatedRecord>> {
    if dataset.is_empty() {
        return Err(DataStoryError::EmptyDataset);
    }
    info!(
        "Preparing dataset ({} rows, {} columns)",
        dataset.rows.len(),
        dataset.headers.len()
    );
    Ok(build_monthly_summary(&dataset.rows, config))
}
