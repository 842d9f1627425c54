use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};

use crate::chat::ChatTurn;
use crate::error::{DataStoryError, Result};
use crate::store::{AnalysisStore, PdfChatEntry, PdfChatStore, StoredAnalysis};

const ANALYSES_TABLE: &str = "analyses";
const PDF_CHATS_TABLE: &str = "pdf_chats";

/// Record store backed by the Supabase REST (PostgREST) endpoint.
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn request(&self, method: Method, table: &str, query: &str) -> RequestBuilder {
        let url = format!("{}/rest/v1/{}{}", self.base_url, table, query);
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DataStoryError::Store(format!(
            "supabase request failed (status {}): {}",
            status, body
        )))
    }
}

#[async_trait]
impl AnalysisStore for SupabaseStore {
    async fn insert_analysis(&self, filename: &str, data: &Value, insights: &str) -> Result<()> {
        debug!("Inserting analysis for {}", filename);
        let response = self
            .request(Method::POST, ANALYSES_TABLE, "")
            .header("Prefer", "return=minimal")
            .json(&json!([{
                "filename": filename,
                "data": data,
                "insights": insights,
            }]))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn list_analyses(&self) -> Result<Vec<StoredAnalysis>> {
        let response = self
            .request(
                Method::GET,
                ANALYSES_TABLE,
                "?select=*&order=created_at.desc",
            )
            .send()
            .await?;
        let entries = Self::check(response).await?.json().await?;
        Ok(entries)
    }
}

#[async_trait]
impl PdfChatStore for SupabaseStore {
    async fn save_chat(&self, filename: &str, pages: Vec<String>) -> Result<PdfChatEntry> {
        debug!("Saving PDF chat for {} ({} pages)", filename, pages.len());
        let response = self
            .request(Method::POST, PDF_CHATS_TABLE, "")
            .header("Prefer", "return=representation")
            .json(&json!([{
                "filename": filename,
                "pages_text": pages,
                "chat_history": [],
            }]))
            .send()
            .await?;
        let mut entries: Vec<PdfChatEntry> = Self::check(response).await?.json().await?;
        entries
            .pop()
            .ok_or_else(|| DataStoryError::Store("insert returned no row".to_string()))
    }

    async fn chat_by_id(&self, id: i64) -> Result<Option<PdfChatEntry>> {
        let response = self
            .request(
                Method::GET,
                PDF_CHATS_TABLE,
                &format!("?select=*&id=eq.{}", id),
            )
            .send()
            .await?;
        let mut entries: Vec<PdfChatEntry> = Self::check(response).await?.json().await?;
        Ok(entries.pop())
    }

    async fn update_history(&self, id: i64, history: &[ChatTurn]) -> Result<()> {
        let response = self
            .request(Method::PATCH, PDF_CHATS_TABLE, &format!("?id=eq.{}", id))
            .header("Prefer", "return=minimal")
            .json(&json!({ "chat_history": history }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
