use std::io::{self, Write};
use std::path::PathBuf;

use data_story_builder::llm::{GeminiClient, PdfChatService};
use data_story_builder::MemoryStore;
use dotenv::dotenv;

/// Pages arrive pre-extracted: the input is a text file with pages
/// separated by form feeds (one page if none are present).
fn load_pages(path: &PathBuf) -> anyhow::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    let pages: Vec<String> = text
        .split('\u{c}')
        .map(|page| page.trim().to_string())
        .filter(|page| !page.is_empty())
        .collect();
    if pages.is_empty() {
        anyhow::bail!("{} contains no text", path.display());
    }
    Ok(pages)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let path: PathBuf = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: pdf_chat <pages.txt>"))?
        .into();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string();

    let pages = load_pages(&path)?;
    let service = PdfChatService::new(GeminiClient::from_env()?, MemoryStore::new());
    let entry = service.open(&file_name, pages).await?;

    println!("💬 Chat over {} ({} pages).", entry.filename, entry.pages_text.len());
    println!("Ask with 'page> question', e.g. '2> Worum geht es?' (type 'quit' to exit).");
    println!("------------------------------------------------------------------");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let line = input.trim();

        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }
        if line.is_empty() {
            continue;
        }

        let (page, question) = match line.split_once('>') {
            Some((page, question)) => (page.trim().parse().unwrap_or(1), question.trim()),
            None => (1, line),
        };

        match service.ask(entry.id, page, question).await {
            Ok(answer) => {
                println!("\n{}\n", answer);
                println!("------------------------------------------------------------------");
            }
            Err(e) => eprintln!("❌ Error: {}", e),
        }
    }

    Ok(())
}
