//! Search command handler.

use clap::Args;
use ragline_core::{config::AppConfig, AppError, AppResult};
use ragline_knowledge::Pipeline;

const PREVIEW_CHARS: usize = 120;

/// Show the chunks that best match a query
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    pub query: String,

    /// Number of hits to return
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing search command");

        let top_k = self.top_k.unwrap_or(config.retrieval.top_k);
        if top_k == 0 {
            return Err(AppError::Config("--top-k must be at least 1".to_string()));
        }

        let pipeline = Pipeline::from_config(config)?;
        let hits = pipeline.retrieve(&self.query, top_k).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&hits)?);
            return Ok(());
        }

        if hits.is_empty() {
            println!("No matching chunks.");
            return Ok(());
        }

        for (rank, hit) in hits.iter().enumerate() {
            let preview: String = hit.text.chars().take(PREVIEW_CHARS).collect();
            println!(
                "{}. [{:.3}] {} ({})\n   {}",
                rank + 1,
                hit.score,
                hit.source,
                hit.section,
                preview.replace('\n', " ")
            );
        }

        Ok(())
    }
}
