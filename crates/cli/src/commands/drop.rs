//! Drop-collection command handler.

use clap::Args;
use ragline_core::{config::AppConfig, AppError, AppResult};
use ragline_knowledge::Pipeline;

/// Delete a collection
#[derive(Args, Debug)]
pub struct DropCollectionCommand {
    /// Collection to delete (e.g. "docs" or "docs_d768")
    pub name: String,

    /// Confirm deletion
    #[arg(long)]
    pub yes: bool,
}

impl DropCollectionCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        if !self.yes {
            return Err(AppError::Config(format!(
                "Refusing to drop collection '{}' without --yes",
                self.name
            )));
        }

        let pipeline = Pipeline::from_config(config)?;
        if pipeline.drop_collection(&self.name).await? {
            println!("Dropped collection '{}'", self.name);
        } else {
            println!("Collection '{}' does not exist", self.name);
        }

        Ok(())
    }
}
