//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    top_k: Option<usize>,
    no_validate: bool,
    mut settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    if let Some(top_k) = top_k {
        settings.rag.top_k = top_k;
    }
    if no_validate {
        settings.rag.validate_input = false;
    }

    let orchestrator = Orchestrator::new(settings)?;
    let service = orchestrator.answer_service()?;

    let spinner = Output::spinner("Searching message archive...");

    match service.answer(question).await {
        Ok(answer) => {
            spinner.finish_and_clear();

            println!("\n{}\n", answer.text);

            if !answer.threads.is_empty() {
                Output::header("Threads");
                for thread in &answer.threads {
                    println!();
                    Output::thread(thread);
                }
            }
            if let Some(seconds) = answer.process_time {
                println!();
                Output::kv("Processed in", &format!("{:.2}s", seconds));
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
