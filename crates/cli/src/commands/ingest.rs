//! Ingest command handler.

use clap::Args;
use ragline_core::{config::AppConfig, AppResult};
use ragline_knowledge::Pipeline;
use std::path::PathBuf;

/// Ingest files and directories
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Files or directories (.txt, .md, .markdown, .html, .htm, .pdf)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for {} path(s)", self.paths.len());

        let pipeline = Pipeline::from_config(config)?;
        let report = pipeline.ingest_paths(&self.paths).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!(
                "Ingested {} document(s) into '{}': {} chunk(s) upserted, {} dropped, {} document(s) skipped in {:.2}s",
                report.documents_processed,
                report.collection.as_deref().unwrap_or("-"),
                report.chunks_upserted,
                report.chunks_dropped,
                report.documents_skipped,
                report.duration_secs()
            );
        }

        Ok(())
    }
}
