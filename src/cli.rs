use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "analyze-package")]
#[command(
    about = "Analyze Go package directories for buildable sources and build metadata",
    long_about = None
)]
pub struct Args {
    /// Package directories to analyze; one JSON record is written per
    /// directory, in argument order
    #[arg(value_name = "DIR", required = true)]
    pub dirs: Vec<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all diagnostics except errors
    #[arg(short, long)]
    pub quiet: bool,
}
