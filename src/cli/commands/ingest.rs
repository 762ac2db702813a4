//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the ingest command.
pub async fn run_ingest(
    file: &str,
    start_at: Option<i64>,
    title: Option<&str>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let path = Settings::expand_path(file);
    let orchestrator = Orchestrator::new(settings)?;

    Output::info(&format!("Importing {}", path.display()));

    match orchestrator.ingest_file(&path, start_at, title, true).await {
        Ok(report) => {
            Output::success(&format!(
                "Imported {} messages into '{}'",
                report.imported, report.title
            ));
            Output::kv("Entries in export", &report.total.to_string());
            Output::kv("Skipped", &report.skipped.to_string());
            if report.failed > 0 {
                Output::warning(&format!("{} messages could not be embedded", report.failed));
            }
        }
        Err(e) => {
            Output::error(&format!("Import failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
