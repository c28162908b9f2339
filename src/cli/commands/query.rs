//! Query command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::CitedFrame;
use anyhow::Result;

/// Run the query command.
pub async fn run_query(
    question: &str,
    index: Option<String>,
    video_id: Option<String>,
    top_k: Option<usize>,
    skip_ensure: bool,
    settings: Settings,
) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Searching...");

    let results = orchestrator
        .search(index.as_deref(), video_id.as_deref(), question, top_k, skip_ensure)
        .await;
    spinner.finish_and_clear();

    match results {
        Ok(matches) => {
            if matches.is_empty() {
                Output::warning("No frames matched your question.");
            } else {
                Output::success(&format!("Found {} matches", matches.len()));

                for m in &matches {
                    let frame = CitedFrame::from(m);
                    Output::frame_match(
                        &frame.frame_id,
                        frame.timestamp,
                        frame.score,
                        &frame.description,
                    );
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
