use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use crate::chat::ChatTurn;
use crate::error::{DataStoryError, Result};
use crate::store::{AnalysisStore, PdfChatEntry, PdfChatStore, StoredAnalysis};

/// In-memory record store. Ids are assigned from a shared counter;
/// entries live as long as the store does.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    analyses: Vec<StoredAnalysis>,
    chats: Vec<PdfChatEntry>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

fn lock_poisoned() -> DataStoryError {
    DataStoryError::Store("memory store lock poisoned".to_string())
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn insert_analysis(&self, filename: &str, data: &Value, insights: &str) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| lock_poisoned())?;
        let id = inner.next_id();
        inner.analyses.push(StoredAnalysis {
            id,
            filename: filename.to_string(),
            created_at: Utc::now(),
            insights: insights.to_string(),
            data: data.clone(),
        });
        Ok(())
    }

    async fn list_analyses(&self) -> Result<Vec<StoredAnalysis>> {
        let inner = self.inner.lock().map_err(|_| lock_poisoned())?;
        // Insertion order is oldest-first; callers get newest-first
        Ok(inner.analyses.iter().rev().cloned().collect())
    }
}

#[async_trait]
impl PdfChatStore for MemoryStore {
    async fn save_chat(&self, filename: &str, pages: Vec<String>) -> Result<PdfChatEntry> {
        let mut inner = self.inner.lock().map_err(|_| lock_poisoned())?;
        let id = inner.next_id();
        let entry = PdfChatEntry {
            id,
            created_at: Utc::now(),
            filename: filename.to_string(),
            pages_text: pages,
            chat_history: Vec::new(),
        };
        inner.chats.push(entry.clone());
        Ok(entry)
    }

    async fn chat_by_id(&self, id: i64) -> Result<Option<PdfChatEntry>> {
        let inner = self.inner.lock().map_err(|_| lock_poisoned())?;
        Ok(inner.chats.iter().find(|c| c.id == id).cloned())
    }

    async fn update_history(&self, id: i64, history: &[ChatTurn]) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| lock_poisoned())?;
        let entry = inner
            .chats
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(DataStoryError::UnknownChat(id))?;
        entry.chat_history = history.to_vec();
        Ok(())
    }
}
