//! Ask command handler.
//!
//! Answers one question, or every line of stdin when no question is given.
//! All questions in one run share the response cache.

use clap::Args;
use futures::StreamExt;
use ragline_core::{config::AppConfig, AppError, AppResult};
use ragline_knowledge::{Answer, Pipeline, SourceRef};
use ragline_llm::GenerationEvent;
use std::io::{BufRead, Write};

/// Answer a question from the ingested documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question (reads one question per line from stdin when omitted)
    pub query: Option<String>,

    /// Print the answer as it is generated
    #[arg(long)]
    pub stream: bool,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let top_k = self.top_k.unwrap_or(config.retrieval.top_k);
        if top_k == 0 {
            return Err(AppError::Config("--top-k must be at least 1".to_string()));
        }

        let pipeline = Pipeline::from_config(config)?;

        if let Some(query) = &self.query {
            return self.answer_one(&pipeline, query, top_k).await;
        }

        tracing::debug!("Reading questions from stdin");
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            let query = line.trim();
            if query.is_empty() {
                continue;
            }
            if let Err(e) = self.answer_one(&pipeline, query, top_k).await {
                tracing::error!("Question failed: {}", e);
                eprintln!("Error: {}", e);
            }
        }

        Ok(())
    }

    async fn answer_one(&self, pipeline: &Pipeline, query: &str, top_k: usize) -> AppResult<()> {
        if self.stream {
            self.handle_streaming(pipeline, query, top_k).await
        } else {
            self.handle_blocking(pipeline, query, top_k).await
        }
    }

    async fn handle_blocking(&self, pipeline: &Pipeline, query: &str, top_k: usize) -> AppResult<()> {
        let answer = pipeline.answer_with(query, top_k).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&answer)?);
        } else {
            println!("{}", answer.text);
            print_sources(&answer.sources);
        }

        Ok(())
    }

    async fn handle_streaming(&self, pipeline: &Pipeline, query: &str, top_k: usize) -> AppResult<()> {
        let mut streaming = pipeline.answer_stream_with(query, top_k).await;
        let mut text = String::new();
        let mut error = None;

        while let Some(event) = streaming.events.next().await {
            match event {
                GenerationEvent::Start => {}
                GenerationEvent::ContentDelta(delta) => {
                    if !self.json {
                        print!("{}", delta);
                        std::io::stdout().flush().ok();
                    }
                    text.push_str(&delta);
                }
                GenerationEvent::ErrorDelta(message) => {
                    tracing::warn!("Answer stream failed: {}", message);
                    error = Some(message);
                }
                GenerationEvent::Done => break,
            }
        }

        if self.json {
            let output = serde_json::json!({
                "answer": Answer {
                    text,
                    sources: streaming.sources,
                    from_cache: streaming.from_cache,
                },
                "error": error,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!();
            if let Some(message) = error {
                eprintln!("[stream interrupted] {}", message);
            }
            print_sources(&streaming.sources);
        }

        Ok(())
    }
}

fn print_sources(sources: &[SourceRef]) {
    if sources.is_empty() {
        return;
    }

    println!("\nSources:");
    for source in sources {
        println!("  - {} ({}) [{:.3}]", source.source, source.section, source.score);
    }
}
