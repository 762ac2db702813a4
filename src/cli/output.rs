//! CLI output formatting utilities.

use crate::message_store::{SimilarityHit, TitleSummary};
use crate::thread::ConversationThread;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a conversation summary.
    pub fn title_info(summary: &TitleSummary) {
        println!(
            "  {} {} ({} messages, rows {}-{})",
            style("*").cyan(),
            style(&summary.title).bold(),
            summary.message_count,
            summary.first_id,
            summary.last_id
        );
    }

    /// Print a search hit.
    pub fn hit(hit: &SimilarityHit) {
        let metadata = &hit.metadata;
        println!(
            "\n{} {} #{} (distance: {:.3})",
            style(">>").green(),
            style(&metadata.title).bold(),
            style(metadata.message_id).cyan(),
            hit.distance
        );
        println!(
            "   {} {}",
            style(metadata.author.as_deref().unwrap_or("Unknown")).dim(),
            style(metadata.date.as_deref().unwrap_or("No date")).dim()
        );
        println!("   {}", content_preview(&hit.content, 200));
    }

    /// Print a reconstructed thread.
    pub fn thread(thread: &ConversationThread) {
        println!("{} root #{}", style(">>").green(), style(thread.root_id).cyan());
        for entry in &thread.entries {
            println!(
                "  {} {} {}",
                style(&entry.date).dim(),
                style(&entry.author).bold(),
                content_preview(&entry.content, 300)
            );
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
