use clap::{Args, Parser, Subcommand};
use ptycho_core::models::ScanIndexFilter;
use std::path::PathBuf;

/// Ptycho - Ptychographic reconstruction pipeline
#[derive(Parser, Debug)]
#[command(name = "ptycho")]
#[command(about = "Ptychographic reconstruction and data-arrival automation", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to ./ptycho.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconstruct a product against a diffraction dataset
    Reconstruct(ReconstructArgs),

    /// Train the reconstructor and save the model
    Train(TrainArgs),

    /// Run a batch action by name
    Batch(BatchArgs),

    /// Show which scan positions match the loaded patterns
    Match(MatchArgs),

    /// Watch a data directory and process files as they arrive
    Watch(WatchArgs),

    /// List registered reconstructors, workflows, and builders
    Plugins,

    /// Show the effective configuration and where each value came from
    Config,
}

#[derive(Args, Debug)]
pub struct ReconstructArgs {
    /// Assembled diffraction patterns
    #[arg(long)]
    pub patterns: PathBuf,

    /// Product file to reconstruct
    #[arg(long)]
    pub input: PathBuf,

    /// Where to save the reconstructed product
    #[arg(long)]
    pub output: PathBuf,

    /// Reconstructor to use
    #[arg(long)]
    pub algorithm: Option<String>,

    /// Reconstruct odd and even scan indexes separately, writing
    /// `<output>.odd.json` and `<output>.even.json`
    #[arg(long, conflicts_with = "transformed")]
    pub split: bool,

    /// Reconstruct once per scan orientation preset, writing
    /// `<output>.preset0.json` through `<output>.preset7.json`
    #[arg(long)]
    pub transformed: bool,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Training data
    #[arg(long)]
    pub input: PathBuf,

    /// Where to save the trained model
    #[arg(long)]
    pub output: PathBuf,

    /// Reconstructor to train
    #[arg(long)]
    pub algorithm: Option<String>,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Action to run (reconstruct or train)
    pub action: String,

    pub input: PathBuf,

    pub output: PathBuf,

    /// Assembled diffraction patterns, loaded before reconstructing
    #[arg(long)]
    pub patterns: Option<PathBuf>,

    /// Reconstructor to use
    #[arg(long)]
    pub algorithm: Option<String>,
}

#[derive(Args, Debug)]
pub struct MatchArgs {
    /// Assembled diffraction patterns
    #[arg(long)]
    pub patterns: PathBuf,

    /// Product whose scan positions are matched
    #[arg(long)]
    pub input: PathBuf,

    /// Scan indexes to keep (all, odd, or even)
    #[arg(long, default_value = "all")]
    pub filter: ScanIndexFilter,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Data directory to watch
    #[arg(long)]
    pub directory: Option<PathBuf>,

    /// Workflow run on each settled file
    #[arg(long)]
    pub strategy: Option<String>,

    /// Seconds a file must stay unchanged before it is processed
    #[arg(long, value_name = "SECONDS")]
    pub delay: Option<u64>,

    /// Minimum seconds between two processed files
    #[arg(long, value_name = "SECONDS")]
    pub interval: Option<u64>,

    /// Poll the directory instead of using native notifications
    #[arg(long)]
    pub polling: bool,

    /// Also process files already in the directory
    #[arg(long)]
    pub existing: bool,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// What to do when a workflow fails (fail or retry)
    #[arg(long, value_name = "POLICY")]
    pub failure_policy: Option<String>,

    /// Assembled diffraction patterns to load before watching
    #[arg(long)]
    pub patterns: Option<PathBuf>,

    /// Reconstructor used by the workflows
    #[arg(long)]
    pub algorithm: Option<String>,
}
