use log::info;

use crate::analysis::{strip_code_fence, DEFAULT_CHAT_MODEL};
use crate::chat::{append_exchange, build_page_prompt};
use crate::error::{DataStoryError, Result};
use crate::llm::client::GeminiClient;
use crate::llm::types::GenerationConfig;
use crate::store::{PdfChatEntry, PdfChatStore};

/// The multi-turn question/answer loop over one uploaded PDF. Page
/// text arrives pre-extracted; this service owns session persistence,
/// page selection, and the capped history.
pub struct PdfChatService<S: PdfChatStore> {
    client: GeminiClient,
    model: String,
    store: S,
}

impl<S: PdfChatStore> PdfChatService<S> {
    pub fn new(client: GeminiClient, store: S) -> Self {
        Self {
            client,
            model: DEFAULT_CHAT_MODEL.to_string(),
            store,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Persist an uploaded document (filename + per-page text) with an
    /// empty history and return the stored entry.
    pub async fn open(&self, filename: &str, pages: Vec<String>) -> Result<PdfChatEntry> {
        info!("Opening PDF chat for {} ({} pages)", filename, pages.len());
        self.store.save_chat(filename, pages).await
    }

    /// Ask a question about one page (1-based). The answer is appended
    /// to the chat history along with the question, and the history is
    /// capped to the most recent pairs before persisting.
    pub async fn ask(&self, id: i64, page: usize, question: &str) -> Result<String> {
        let entry = self
            .store
            .chat_by_id(id)
            .await?
            .ok_or(DataStoryError::UnknownChat(id))?;

        let page_text = page
            .checked_sub(1)
            .and_then(|idx| entry.pages_text.get(idx))
            .ok_or(DataStoryError::PageOutOfRange {
                page,
                pages: entry.pages_text.len(),
            })?;

        let prompt = build_page_prompt(page, page_text, &entry.chat_history, question);
        let raw = self
            .client
            .generate_content(&self.model, &prompt, GenerationConfig::text())
            .await?;
        let answer = strip_code_fence(&raw);

        let history = append_exchange(entry.chat_history, question, &answer, page);
        self.store.update_history(id, &history).await?;

        Ok(answer)
    }
}
