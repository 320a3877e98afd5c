use crate::interviewer::{
    DEFAULT_QUESTION_COUNT, FEEDBACK_TEMPERATURE, Interviewer, QUESTIONS_TEMPERATURE,
    warn_on_feedback_mismatch,
};
use crate::prompts::PromptSet;
use crate::schema;
use crate::types::{Answer, Feedback, Question};
use anyhow::{Context, Result};
use async_trait::async_trait;
use gemini_client::GeminiClient;

/// An `Interviewer` backed by Gemini's `generateContent` endpoint.
pub struct GeminiInterviewer {
    client: GeminiClient,
    question_count: usize,
    prompts: PromptSet,
}

impl GeminiInterviewer {
    pub fn new(client: GeminiClient, prompts: PromptSet) -> Self {
        Self {
            client,
            question_count: DEFAULT_QUESTION_COUNT,
            prompts,
        }
    }

    pub fn with_question_count(mut self, question_count: usize) -> Self {
        self.question_count = question_count;
        self
    }
}

#[async_trait]
impl Interviewer for GeminiInterviewer {
    async fn generate_questions(&self, topic: &str) -> Result<Vec<Question>> {
        let prompt = self.prompts.questions_prompt(topic, self.question_count);
        let raw = self
            .client
            .generate_json(&prompt, QUESTIONS_TEMPERATURE)
            .await
            .context("Gemini question generation failed")?;
        let questions = schema::parse_questions(&raw)
            .with_context(|| format!("Malformed questions from {}", self.client.model()))?;
        tracing::debug!("Generated {} questions for '{}'", questions.len(), topic);
        Ok(questions)
    }

    async fn generate_feedback(&self, topic: &str, answers: &[Answer]) -> Result<Feedback> {
        let prompt = self.prompts.feedback_prompt(topic, answers)?;
        let raw = self
            .client
            .generate_json(&prompt, FEEDBACK_TEMPERATURE)
            .await
            .context("Gemini feedback generation failed")?;
        let feedback = schema::parse_feedback(&raw)
            .with_context(|| format!("Malformed feedback from {}", self.client.model()))?;
        warn_on_feedback_mismatch(&feedback, answers);
        Ok(feedback)
    }
}
