// services/chat_service.rs
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::error;

use crate::errors::{AppError, Result};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<Part>,
}

/// Thin client for the generative-language API. The provider is opaque to
/// the rest of the backend: text in, text out, everything else is an
/// `ExternalApi` error.
#[derive(Debug, Clone)]
pub struct ChatService {
    api_key: String,
    model: String,
    client: Client,
}

impl ChatService {
    pub fn new(api_key: String, model: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        ChatService {
            api_key,
            model,
            client,
        }
    }

    pub async fn generate_reply(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            GEMINI_BASE_URL, self.model
        );

        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::external_api(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            error!("Gemini returned status: {}", response.status());
            return Err(AppError::external_api(format!(
                "Gemini returned status: {}",
                response.status()
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::external_api(format!("Gemini response parse failed: {}", e)))?;

        let reply = body
            .candidates
            .into_iter()
            .flatten()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| AppError::external_api("Gemini response contained no candidates"))?;

        Ok(reply)
    }
}
