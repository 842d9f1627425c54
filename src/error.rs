use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataStoryError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("CSV decode error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet decode error: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    #[error("The file contains no data rows")]
    EmptyDataset,

    #[error("Gemini API key is not configured (set GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("The Gemini API key was rejected")]
    InvalidApiKey,

    #[error("The Gemini API quota is exhausted")]
    QuotaExceeded,

    #[error("Gemini API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("The model reply is not valid JSON: {0}")]
    MalformedResponse(String),

    #[error("The model reply has an unexpected structure: {0}")]
    SchemaMismatch(String),

    #[error("History store error: {0}")]
    Store(String),

    #[error("No chat session with id {0}")]
    UnknownChat(i64),

    #[error("Page {page} does not exist (document has {pages} pages)")]
    PageOutOfRange { page: usize, pages: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[cfg(any(feature = "gemini", feature = "supabase"))]
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DataStoryError>;
