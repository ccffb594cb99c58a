//! Command handlers for the ragline CLI.

pub mod ask;
pub mod drop;
pub mod ingest;
pub mod search;
pub mod stats;

pub use ask::AskCommand;
pub use drop::DropCollectionCommand;
pub use ingest::IngestCommand;
pub use search::SearchCommand;
pub use stats::StatsCommand;
