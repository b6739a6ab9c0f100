use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "sentiment-demo",
    about = "Sentiment demo - page controllers and speech transcript listener"
)]
pub struct CliArgs {
    /// Settings file (JSON). Created with defaults if missing
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Origin of the scoring service, e.g. http://127.0.0.1:5000
    #[arg(long)]
    pub base_url: Option<String>,

    /// Enable debug mode with verbose logging
    #[arg(long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Score one piece of text right away
    Score { text: String },
    /// Treat each stdin line as an edit of the input field
    Watch,
    /// Read recognition events (JSON lines) from stdin and emit transcripts on stdout
    Listen,
}
