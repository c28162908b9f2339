//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(index: Option<String>, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    match index {
        Some(name) => match orchestrator.list_namespaces(Some(&name)).await {
            Ok((index, namespaces)) => {
                if namespaces.is_empty() {
                    Output::info(&format!("Collection '{}' has no namespaces yet.", index));
                } else {
                    Output::header(&format!("Namespaces in {} ({})", index, namespaces.len()));
                    for namespace in &namespaces {
                        Output::list_item(namespace);
                    }
                }
            }
            Err(e) => {
                Output::error(&format!("Failed to list namespaces: {}", e));
                return Err(e.into());
            }
        },
        None => match orchestrator.list_indexes().await {
            Ok(indexes) => {
                if indexes.is_empty() {
                    Output::info("No collections yet. Use 'blikk ingest <frames.json>' to create one.");
                } else {
                    Output::header(&format!("Collections ({})", indexes.len()));
                    for name in &indexes {
                        Output::list_item(name);
                    }
                }
            }
            Err(e) => {
                Output::error(&format!("Failed to list collections: {}", e));
                return Err(e.into());
            }
        },
    }

    Ok(())
}
