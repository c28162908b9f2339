//! Overview command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the overview command.
pub async fn run_overview(
    index: Option<String>,
    video_id: Option<String>,
    top_k: Option<usize>,
    skip_ensure: bool,
    settings: Settings,
) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Recovering frames...");

    match orchestrator
        .overview(index.as_deref(), video_id.as_deref(), top_k, skip_ensure)
        .await
    {
        Ok(overview) => {
            spinner.finish_and_clear();

            if let Some(summary) = &overview.summary {
                Output::header("Summary");
                println!("{}\n", summary);
            }

            if overview.frames.is_empty() {
                Output::warning(&format!(
                    "No frames found in {}/{}.",
                    overview.index, overview.namespace
                ));
            } else {
                Output::header(&format!("Timeline ({} frames)", overview.frames.len()));
                for frame in &overview.frames {
                    Output::timeline_row(&frame.frame_id, frame.timestamp, &frame.description);
                }
            }

            for warning in &overview.warnings {
                Output::warning(warning);
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Overview failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
