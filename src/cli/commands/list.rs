//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    match orchestrator.store().list_titles().await {
        Ok(titles) => {
            if titles.is_empty() {
                Output::info("No conversations imported yet. Use 'hilo ingest <export.json>' to add one.");
            } else {
                Output::header(&format!("Conversations ({})", titles.len()));
                println!();

                for summary in &titles {
                    Output::title_info(summary);
                }

                let total: u32 = titles.iter().map(|t| t.message_count).sum();
                println!();
                Output::kv("Total conversations", &titles.len().to_string());
                Output::kv("Total messages", &total.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list conversations: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
