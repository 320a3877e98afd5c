use crate::prompts::PromptSet;
use crate::schema;
use crate::types::{Answer, Feedback, Question};
use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Number of questions requested per session unless configured otherwise.
pub const DEFAULT_QUESTION_COUNT: usize = 10;

pub(crate) const QUESTIONS_TEMPERATURE: f32 = 0.7;
// Low temperature for consistent grading.
pub(crate) const FEEDBACK_TEMPERATURE: f32 = 0.2;

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub content: String,
}

// The `Interviewer` trait is the seam between the session and whichever
// language model writes the questions and grades the answers. The session only
// depends on this trait, so unit tests drive it with `MockInterviewer`.
//
// Implementations must hand back validated data: raw model output goes through
// `schema::parse_questions` / `schema::parse_feedback` before it is returned.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Interviewer: Send + Sync {
    async fn generate_questions(&self, topic: &str) -> Result<Vec<Question>>;

    async fn generate_feedback(&self, topic: &str, answers: &[Answer]) -> Result<Feedback>;
}

pub(crate) fn warn_on_feedback_mismatch(feedback: &Feedback, answers: &[Answer]) {
    if feedback.detailed_feedback.len() != answers.len() {
        tracing::warn!(
            "Feedback covers {} answers but {} were submitted",
            feedback.detailed_feedback.len(),
            answers.len()
        );
    }
}

/// An `Interviewer` backed by the OpenAI Chat Completions API.
pub struct OpenAiInterviewer {
    client: Client,
    api_key: SecretString,
    model: String,
    question_count: usize,
    prompts: PromptSet,
}

impl OpenAiInterviewer {
    pub fn new(api_key: SecretString, model: String, prompts: PromptSet) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            question_count: DEFAULT_QUESTION_COUNT,
            prompts,
        }
    }

    pub fn with_question_count(mut self, question_count: usize) -> Self {
        self.question_count = question_count;
        self
    }

    async fn complete_json(&self, prompt: String, temperature: f32) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "response_format": { "type": "json_object" },
            "temperature": temperature
        });

        let resp = self
            .client
            .post(OPENAI_CHAT_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("Failed to reach the OpenAI API")?
            .error_for_status()
            .context("OpenAI API returned an error status")?
            .json::<LlmResponse>()
            .await
            .context("Failed to decode OpenAI response")?;

        let answer = &resp
            .choices
            .first()
            .ok_or_else(|| anyhow::anyhow!("No response from LLM"))?
            .message
            .content;
        Ok(answer.clone())
    }
}

#[async_trait]
impl Interviewer for OpenAiInterviewer {
    async fn generate_questions(&self, topic: &str) -> Result<Vec<Question>> {
        let prompt = self.prompts.questions_prompt(topic, self.question_count);
        let raw = self.complete_json(prompt, QUESTIONS_TEMPERATURE).await?;
        let questions = schema::parse_questions(&raw)
            .with_context(|| format!("Malformed questions from {}", self.model))?;
        tracing::debug!("Generated {} questions for '{}'", questions.len(), topic);
        Ok(questions)
    }

    async fn generate_feedback(&self, topic: &str, answers: &[Answer]) -> Result<Feedback> {
        let prompt = self.prompts.feedback_prompt(topic, answers)?;
        let raw = self.complete_json(prompt, FEEDBACK_TEMPERATURE).await?;
        let feedback = schema::parse_feedback(&raw)
            .with_context(|| format!("Malformed feedback from {}", self.model))?;
        warn_on_feedback_mismatch(&feedback, answers);
        Ok(feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn live_interviewer() -> OpenAiInterviewer {
        dotenvy::dotenv_override().ok();
        let api_key = env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");
        OpenAiInterviewer::new(
            SecretString::from(api_key),
            "gpt-4o".to_string(),
            PromptSet::default(),
        )
        .with_question_count(3)
    }

    // This is an integration test that makes a live call to the OpenAI API.
    // It is ignored by default; run it with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn test_generate_questions_for_databases() {
        let interviewer = live_interviewer();

        let questions = interviewer
            .generate_questions("databases")
            .await
            .expect("generate_questions failed");

        println!("Questions: {:?}", questions);
        assert!(!questions.is_empty());
        assert!(questions.iter().all(|q| !q.question.trim().is_empty()));
    }

    // Live test, see `test_generate_questions_for_databases`.
    #[tokio::test]
    #[ignore]
    async fn test_generate_feedback_covers_each_answer() {
        let interviewer = live_interviewer();
        let answers = vec![
            Answer {
                question: "What is a database index?".to_string(),
                answer: "A structure that makes lookups faster, like a B-tree on a column."
                    .to_string(),
            },
            Answer {
                question: "What does ACID stand for?".to_string(),
                answer: "I'm not sure.".to_string(),
            },
        ];

        let feedback = interviewer
            .generate_feedback("databases", &answers)
            .await
            .expect("generate_feedback failed");

        println!("Feedback: {:?}", feedback);
        assert!(!feedback.overall_feedback.is_empty());
        assert_eq!(feedback.detailed_feedback.len(), answers.len());
    }
}
