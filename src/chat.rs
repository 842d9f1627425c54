//! Page-scoped chat turns and the prompt built for each question. The
//! live service in `llm::chat` drives this against the API and the
//! chat store.

use serde::{Deserialize, Serialize};

/// Most turns kept per chat (5 question/answer pairs).
pub const HISTORY_CAP: usize = 10;
/// Prior turns included as context in each new prompt.
pub const CONTEXT_TURNS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    /// Which page the turn referred to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>, page: usize) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            page: Some(page),
        }
    }

    pub fn assistant(content: impl Into<String>, page: usize) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            page: Some(page),
        }
    }
}

/// Append a question/answer pair, keeping only the most recent
/// [`HISTORY_CAP`] turns.
pub fn append_exchange(
    mut history: Vec<ChatTurn>,
    question: &str,
    answer: &str,
    page: usize,
) -> Vec<ChatTurn> {
    history.push(ChatTurn::user(question, page));
    history.push(ChatTurn::assistant(answer, page));
    if history.len() > HISTORY_CAP {
        history.drain(..history.len() - HISTORY_CAP);
    }
    history
}

/// The prompt for one question against one page: the page text, the
/// tail of the prior conversation, and the new question. The model is
/// asked for plain text.
pub fn build_page_prompt(
    page_number: usize,
    page_text: &str,
    history: &[ChatTurn],
    question: &str,
) -> String {
    let tail = &history[history.len().saturating_sub(CONTEXT_TURNS)..];
    let context: String = tail
        .iter()
        .map(|turn| {
            let speaker = match turn.role {
                ChatRole::User => "Nutzer",
                ChatRole::Assistant => "KI",
            };
            format!("{}: {}\n", speaker, turn.content)
        })
        .collect();

    let mut prompt = format!(
        "Hier ist der Text von Seite {page_number} des PDFs:\n\n{page_text}\n\n"
    );
    if !context.is_empty() {
        prompt.push_str(&format!("Bisheriger Chat:\n{context}\n"));
    }
    prompt.push_str(&format!(
        "Neue Nutzerfrage: {question}\n\nAntworte bitte nur auf Basis von Seite {page_number} und dem bisherigen Chat."
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_exchange_caps_history() {
        let mut history = Vec::new();
        for i in 0..6 {
            history = append_exchange(history, &format!("Frage {}", i), &format!("Antwort {}", i), 1);
        }

        // Only the 5 most recent pairs survive
        assert_eq!(history.len(), HISTORY_CAP);
        assert_eq!(history[0].content, "Frage 1");
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[9].content, "Antwort 5");
        assert_eq!(history[9].role, ChatRole::Assistant);
    }

    #[test]
    fn test_page_prompt_includes_page_and_context_tail() {
        let mut history = Vec::new();
        for i in 0..3 {
            history = append_exchange(history, &format!("F{}", i), &format!("A{}", i), 2);
        }

        let prompt = build_page_prompt(2, "Seiteninhalt hier.", &history, "Worum geht es?");

        assert!(prompt.contains("Seite 2"));
        assert!(prompt.contains("Seiteninhalt hier."));
        assert!(prompt.contains("Worum geht es?"));
        // Only the last four turns appear
        assert!(prompt.contains("Nutzer: F2"));
        assert!(prompt.contains("KI: A2"));
        assert!(prompt.contains("Nutzer: F1"));
        assert!(!prompt.contains("Nutzer: F0"));
    }

    #[test]
    fn test_page_prompt_without_history() {
        let prompt = build_page_prompt(1, "Text.", &[], "Frage?");
        assert!(!prompt.contains("Bisheriger Chat"));
    }
}
