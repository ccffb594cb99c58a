//! Stats command handler.

use clap::Args;
use ragline_core::{config::AppConfig, AppResult};
use ragline_knowledge::Pipeline;

/// Show collection statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let pipeline = Pipeline::from_config(config)?;
        let stats = pipeline.stats().await?;

        // Needs the embedding backend when the dimensionality is not configured
        let active = match pipeline.active_collection().await {
            Ok(active) => active.map(|c| c.name),
            Err(e) => {
                tracing::warn!("Could not resolve the active collection: {}", e);
                None
            }
        };

        if self.json {
            let output = serde_json::json!({
                "base": config.vector_store.collection,
                "active": active,
                "collections": stats,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        if stats.is_empty() {
            println!(
                "No collections under '{}'. Run 'ragline ingest' first.",
                config.vector_store.collection
            );
            return Ok(());
        }

        for entry in &stats {
            let marker = if active.as_deref() == Some(entry.collection.name.as_str()) {
                "*"
            } else {
                " "
            };
            println!(
                "{} {:<24} {:>6} dims  {:<9} {:>8} points",
                marker,
                entry.collection.name,
                entry.collection.dimensionality,
                entry.collection.distance,
                entry.points
            );
        }

        Ok(())
    }
}
