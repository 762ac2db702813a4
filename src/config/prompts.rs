//! Prompt templates for Hilo.
//!
//! Prompts can be customized by placing a `rag.toml` file in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    pub rag: RagPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            rag: RagPrompts::default(),
            variables: default_variables(),
        }
    }
}

fn default_variables() -> HashMap<String, String> {
    HashMap::from([
        (
            "assistant_name".to_string(),
            "Argentine School Directory".to_string(),
        ),
        (
            "domain".to_string(),
            "schools in Argentina and the Argentine system of education".to_string(),
        ),
    ])
}

/// Prompts and canned answers for question answering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    /// System prompt; receives {{context}}.
    pub system: String,
    /// In-domain check; receives {{query}}. The model must answer True or False.
    pub validation: String,
    pub context_header: String,
    pub context_footer: String,
    /// Returned when no stored message matches the question.
    pub no_context_answer: String,
    /// Returned when the in-domain check rejects the question.
    pub invalid_input_answer: String,
    /// Returned when the generation backend fails.
    pub apology_answer: String,
}

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            system: r#"As the '{{assistant_name}}' assistant, your primary goal is to deliver thorough and complete answers to questions by synthesizing all pertinent information about {{domain}} from the provided context and the ongoing dialogue chains.

Guidelines:
- Each context entry is a reconstructed chat thread: a root marker followed by messages in chronological order, each with author, content and date
- Ensure that no question remains unanswered without explanation
- If, after reviewing all available data, the information required to answer the question is not found, explicitly declare that you do not possess the necessary data
- If you list prices, add the publication date for reference
- Use Markdown formatting for the response
- Answer in English

{{context}}"#
                .to_string(),

            validation: r#"Check that the user query is related to {{domain}}.
The query can contain only a school or institution name.
Respond with exactly one word: True or False.

User query: {{query}}"#
                .to_string(),

            context_header: "Available context:".to_string(),

            context_footer: "Use this context to answer the user's question. If the context does not contain the necessary information, state this."
                .to_string(),

            no_context_answer: "I couldn't find any relevant information in the message archive for this question."
                .to_string(),

            invalid_input_answer: "Invalid input. Please input related question.".to_string(),

            apology_answer: "Sorry, an error occurred while getting the response.".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    ///
    /// Custom variables are layered over the built-in `assistant_name` and `domain`.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables.extend(vars.clone());
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are expanded in one left-to-right pass; substituted text
    /// is never scanned again. Unknown placeholders are kept as written.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find("{{") {
            result.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            match after.find("}}") {
                Some(close) => {
                    let name = &after[..close];
                    match vars.get(name) {
                        Some(value) => result.push_str(value),
                        None => {
                            result.push_str("{{");
                            result.push_str(name);
                            result.push_str("}}");
                        }
                    }
                    rest = &after[close + 2..];
                }
                None => {
                    result.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }

        result.push_str(rest);
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
