use crate::types::{GenerateContentRequest, GenerateContentResponse};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};

pub const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// A client for the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", BASE_URL, self.model)
    }

    /// Sends one `generateContent` request and returns the decoded response.
    pub async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        tracing::debug!("Sending generateContent request to model {}", self.model);
        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .context("Failed to reach the Gemini API")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API returned {}: {}", status, body.trim());
        }

        resp.json::<GenerateContentResponse>()
            .await
            .context("Failed to decode Gemini response")
    }

    /// Sends a single prompt, asking for a JSON answer, and returns the raw text.
    pub async fn generate_json(&self, prompt: &str, temperature: f32) -> Result<String> {
        let request = json_request(prompt, temperature);
        let response = self.generate_content(&request).await?;

        if let Some(reason) = response.block_reason() {
            anyhow::bail!("Gemini blocked the prompt: {}", reason);
        }
        response
            .text()
            .ok_or_else(|| anyhow::anyhow!("No text in Gemini response"))
    }
}

fn json_request(prompt: &str, temperature: f32) -> GenerateContentRequest {
    GenerateContentRequest::from_prompt(prompt)
        .with_json_response()
        .with_temperature(temperature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_endpoint_includes_model() {
        let client = GeminiClient::new(SecretString::from("key".to_string()))
            .with_model("gemini-test");

        assert_eq!(
            client.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-test:generateContent"
        );
        assert_eq!(client.model(), "gemini-test");
    }

    #[test]
    fn test_json_request_carries_temperature() {
        let request = json_request("Grade these answers", 0.2);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value["generationConfig"]["responseMimeType"],
            "application/json"
        );
        let temperature = value["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.2).abs() < 1e-6);
    }

    // Live call against the Gemini API. Run with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn test_generate_json_live() {
        dotenvy::dotenv_override().ok();
        let api_key = env::var("GEMINI_API_KEY").expect("GEMINI_API_KEY not set");
        let client = GeminiClient::new(SecretString::from(api_key));

        let text = client
            .generate_json(
                r#"Return the JSON array [{"question": "ping"}] and nothing else."#,
                0.0,
            )
            .await
            .expect("generate_json failed");

        let parsed: serde_json::Value = serde_json::from_str(&text).expect("Should be JSON");
        assert!(parsed.is_array() || parsed.is_object());
    }
}
