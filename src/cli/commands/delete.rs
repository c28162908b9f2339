//! Delete command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the delete command.
pub async fn run_delete(index: &str, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    match orchestrator.delete_index(index).await {
        Ok(deleted) => {
            Output::success(&format!("Deleted collection '{}'", deleted));
        }
        Err(e) => {
            Output::error(&format!("Delete failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
