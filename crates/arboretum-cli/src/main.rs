// crates/arboretum-cli/src/main.rs

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
use commands::check::handle_check;
use commands::publish::handle_publish;
use commands::summarize::handle_summarize;
use commands::sync::handle_sync;

/// A CLI for the arboretum dashboard data pipeline
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Repository root holding the data folders and derived CSVs.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Validate configuration and local files without publishing.
    Check {
        /// Also authenticate and resolve each configured item.
        #[arg(long)]
        remote: bool,
    },
    /// Mirror the data folders from a dashboard repository checkout.
    Sync {
        #[arg(short, long)]
        source: PathBuf,
    },
    /// Rebuild the derived summary CSVs from the data folders.
    Summarize,
    /// Overwrite the hosted feature layers from the derived CSVs.
    Publish {
        /// Publish the CSVs as they are instead of rebuilding them first.
        #[arg(long)]
        no_refresh: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let settings = arboretum_core::config::Settings::load(&cli.root)?;

    match cli.command {
        Commands::Check { remote } => handle_check(&cli.root, &settings, remote).await?,
        Commands::Sync { source } => handle_sync(&source, &cli.root, &settings)?,
        Commands::Summarize => handle_summarize(&cli.root, &settings)?,
        Commands::Publish { no_refresh } => {
            handle_publish(&cli.root, &settings, no_refresh).await?
        }
    }

    println!("\n✅ CLI command finished successfully.");
    Ok(())
}
