//! Thread command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the thread command.
pub async fn run_thread(title: &str, message_id: i64, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    match orchestrator.thread(title, message_id).await {
        Ok(thread) => {
            Output::header(&format!("{} #{}", title, message_id));
            println!();
            Output::thread(&thread);
        }
        Err(e) => {
            Output::error(&format!("Failed to reconstruct thread: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
