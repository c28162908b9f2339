//! Analyze command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::CitedFrame;
use anyhow::Result;

/// Run the analyze command.
pub async fn run_analyze(
    question: &str,
    index: Option<String>,
    video_id: Option<String>,
    top_k: Option<usize>,
    skip_ensure: bool,
    settings: Settings,
) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Retrieving frames and generating answer...");

    match orchestrator
        .analyze(index.as_deref(), video_id.as_deref(), question, top_k, skip_ensure)
        .await
    {
        Ok(response) => {
            spinner.finish_and_clear();

            println!("\n{}\n", response.answer);

            if !response.citations.is_empty() {
                Output::header("Cited frames (chronological)");
                for citation in &response.citations {
                    let frame = CitedFrame::from(citation);
                    Output::frame_match(
                        &frame.frame_id,
                        frame.timestamp,
                        frame.score,
                        &frame.description,
                    );
                }
            }

            for warning in &response.warnings {
                Output::warning(warning);
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
