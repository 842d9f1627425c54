//! Persistence contracts for the analysis history and PDF chats. The
//! pipeline treats both as record stores: inserts are best-effort side
//! effects, reads return whole entries. `MemoryStore` backs tests and
//! offline use; `SupabaseStore` (feature `supabase`) talks to the
//! hosted tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::ChatTurn;
use crate::error::Result;

mod memory;
pub use memory::MemoryStore;

#[cfg(feature = "supabase")]
mod supabase;
#[cfg(feature = "supabase")]
pub use supabase::SupabaseStore;

/// One persisted analysis run: the raw pre-aggregation rows (so the
/// run can be repeated) and the insights the model returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAnalysis {
    pub id: i64,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    /// Serialized analysis payload.
    pub insights: String,
    /// Raw decoded rows as uploaded, pre-aggregation.
    pub data: Value,
}

/// One persisted PDF chat: per-page text plus the capped conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfChatEntry {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub filename: String,
    pub pages_text: Vec<String>,
    pub chat_history: Vec<ChatTurn>,
}

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn insert_analysis(&self, filename: &str, data: &Value, insights: &str) -> Result<()>;

    /// All stored analyses, newest first.
    async fn list_analyses(&self) -> Result<Vec<StoredAnalysis>>;
}

#[async_trait]
pub trait PdfChatStore: Send + Sync {
    /// Persist a freshly uploaded document with an empty history and
    /// return the stored entry (with its id).
    async fn save_chat(&self, filename: &str, pages: Vec<String>) -> Result<PdfChatEntry>;

    async fn chat_by_id(&self, id: i64) -> Result<Option<PdfChatEntry>>;

    async fn update_history(&self, id: i64, history: &[ChatTurn]) -> Result<()>;
}
