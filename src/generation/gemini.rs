//! Google Gemini `generateContent` backend.

use super::Generator;
use crate::error::{HiloError, Result};
use crate::openai::create_http_client;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().map(|p| p.text).collect();
        (!text.is_empty()).then_some(text)
    }
}

/// Gemini-based generator.
pub struct GeminiGenerator {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    api_key: String,
    temperature: Option<f32>,
}

impl GeminiGenerator {
    /// Create a generator for `model` under the API at `base_url`.
    pub fn with_config(base_url: &str, model: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_http_client(timeout)?,
            endpoint: Self::endpoint(base_url, model)?,
            model: model.to_string(),
            api_key: api_key.to_string(),
            temperature: None,
        })
    }

    fn endpoint(base_url: &str, model: &str) -> Result<Url> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join(&format!("models/{}:generateContent", model))?)
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    fn request<'a>(&self, system: &'a str, user: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            system_instruction: (!system.is_empty()).then(|| Content {
                role: None,
                parts: vec![Part { text: system }],
            }),
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: user }],
            }],
            generation_config: self.temperature.map(|temperature| GenerationConfig { temperature }),
        }
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let response: GenerateResponse = self
            .client
            .post(self.endpoint.clone())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request(system, user))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let answer = response
            .text()
            .ok_or_else(|| HiloError::GenerationFailure("Empty response from Gemini".to_string()))?;

        debug!("Generated {} characters", answer.len());
        Ok(answer)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> GeminiGenerator {
        GeminiGenerator::with_config(
            "https://generativelanguage.googleapis.com/v1beta/",
            "gemini-2.0-flash",
            "key",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            generator().endpoint.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_endpoint_without_trailing_slash() {
        let endpoint = GeminiGenerator::endpoint(
            "https://generativelanguage.googleapis.com/v1beta",
            "gemini-2.0-flash",
        )
        .unwrap();
        assert_eq!(
            endpoint.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_request_body() {
        let generator = generator().with_temperature(Some(0.5));
        let body = serde_json::to_value(generator.request("be brief", "hola")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "systemInstruction": {"parts": [{"text": "be brief"}]},
                "contents": [{"role": "user", "parts": [{"text": "hola"}]}],
                "generationConfig": {"temperature": 0.5}
            })
        );

        let body = serde_json::to_value(generator.request("", "hola")).unwrap();
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_response_text() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "Hola"}, {"text": " mundo"}], "role": "model"}}]}"#,
        )
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("Hola mundo"));

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(empty.text().is_none());
    }
}
