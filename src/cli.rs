use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "intrack")]
#[command(about = "Tracks site compatibility interventions across distribution channels")]
#[command(version)]
pub struct Cli {
    /// Path to the interventions config file
    #[arg(long, default_value = "interventions.toml", global = true)]
    pub config: PathBuf,

    /// Database path (defaults to the platform data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the daily importer in the foreground
    Serve,

    /// Trigger one import run now
    Import,

    /// List the current interventions for one distribution
    List(ListArgs),

    /// Show the most recent aggregate counts
    Counts,

    /// Query reshaped history rows as JSON
    History(HistoryArgs),
}

#[derive(Parser)]
pub struct ListArgs {
    /// Distribution channel to list
    pub distribution: String,
}

#[derive(Parser)]
pub struct HistoryArgs {
    /// Range start as YYYY-MM-DD (defaults to January 1 of this year)
    #[arg(long)]
    pub start: Option<String>,

    /// Range end as YYYY-MM-DD, inclusive (defaults to today)
    #[arg(long)]
    pub end: Option<String>,

    /// Distribution channel to report on
    #[arg(long)]
    pub distribution: String,

    /// Intervention type, or "all" to sum across types
    #[arg(long, default_value = "all")]
    pub r#type: String,
}
