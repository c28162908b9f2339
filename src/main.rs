//! Blikk CLI entry point.

use anyhow::Result;
use blikk::cli::{commands, Cli, Commands};
use blikk::config::Settings;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("blikk={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Ensure the data directory exists
    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match &cli.command {
        Commands::Ingest {
            input,
            index,
            video_id,
            summary,
            video_filename,
            skip_ensure,
        } => {
            commands::run_ingest(
                input,
                index.clone(),
                video_id.clone(),
                summary.clone(),
                video_filename.clone(),
                *skip_ensure,
                settings,
            )
            .await?;
        }

        Commands::Query {
            question,
            index,
            video_id,
            top_k,
            skip_ensure,
        } => {
            commands::run_query(
                question,
                index.clone(),
                video_id.clone(),
                *top_k,
                *skip_ensure,
                settings,
            )
            .await?;
        }

        Commands::Analyze {
            question,
            index,
            video_id,
            top_k,
            skip_ensure,
        } => {
            commands::run_analyze(
                question,
                index.clone(),
                video_id.clone(),
                *top_k,
                *skip_ensure,
                settings,
            )
            .await?;
        }

        Commands::Overview {
            index,
            video_id,
            top_k,
            skip_ensure,
        } => {
            commands::run_overview(
                index.clone(),
                video_id.clone(),
                *top_k,
                *skip_ensure,
                settings,
            )
            .await?;
        }

        Commands::List { index } => {
            commands::run_list(index.clone(), settings).await?;
        }

        Commands::Delete { index } => {
            commands::run_delete(index, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings)?;
        }
    }

    Ok(())
}
