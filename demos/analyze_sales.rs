use std::path::PathBuf;

use data_story_builder::llm::DataAnalyst;
use data_story_builder::pipeline::StoryPipeline;
use data_story_builder::{AnalysisResponse, FileKind, MemoryStore};
use dotenv::dotenv;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let path: PathBuf = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: analyze_sales <file.csv|file.xlsx>"))?
        .into();
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();

    println!("📊 Analyzing {}...\n", file_name);

    let kind = FileKind::from_path(&path)?;
    let bytes = std::fs::read(&path)?;

    let pipeline = StoryPipeline::new(DataAnalyst::from_env()?).with_store(MemoryStore::new());
    let outcome = pipeline.run(&file_name, &bytes, kind).await?;

    println!("Aggregated records:");
    for record in &outcome.records {
        println!("  {}  {:<12} {:>10.2}", record.month, record.region, record.revenue);
    }

    match &outcome.analysis {
        AnalysisResponse::Dashboard(dashboard) => {
            println!("\n📝 {}\n", dashboard.summary_text);
            println!("Key insights:");
            for insight in &dashboard.key_insights {
                println!("  • {}", insight);
            }
            println!("\nChart suggestions:");
            for chart in &dashboard.chart_suggestions {
                println!("  • [{:?}] {} — {}", chart.chart_type, chart.title, chart.description);
            }
            println!("\nRecommendations:");
            for recommendation in &dashboard.actionable_recommendations {
                println!("  • {}", recommendation);
            }
        }
        AnalysisResponse::Summary(summary) => {
            println!("\n📝 {}\n", summary.summary_text);
            for insight in &summary.key_insights {
                println!("  • {}", insight);
            }
        }
    }

    Ok(())
}
