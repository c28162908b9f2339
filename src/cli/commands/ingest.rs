//! Ingest command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::frames::FrameRecord;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the ingest command.
#[allow(clippy::too_many_arguments)]
pub async fn run_ingest(
    input: &str,
    index: Option<String>,
    video_id: Option<String>,
    summary: Option<String>,
    video_filename: Option<String>,
    skip_ensure: bool,
    settings: Settings,
) -> Result<()> {
    let content = std::fs::read_to_string(input)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", input, e))?;
    let frames: Vec<FrameRecord> = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("{} is not a frame record array: {}", input, e))?;

    Output::info(&format!("Read {} frame records from {}", frames.len(), input));

    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Embedding and upserting frames...");

    match orchestrator
        .ingest(
            index.as_deref(),
            video_id.as_deref(),
            frames,
            summary,
            video_filename,
            skip_ensure,
        )
        .await
    {
        Ok(outcome) => {
            spinner.finish_and_clear();
            Output::success(&format!(
                "Upserted {} vectors into {}/{}",
                outcome.upserted, outcome.index, outcome.namespace
            ));
            for warning in &outcome.warnings {
                Output::warning(warning);
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Ingestion failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
