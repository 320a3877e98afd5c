use crate::types::Answer;
use anyhow::{Context, Result};
use std::collections::HashMap;

pub const QUESTIONS_PROMPT_KEY: &str = "generate_questions";
pub const FEEDBACK_PROMPT_KEY: &str = "generate_feedback";

/// Prompt templates for the two provider calls.
///
/// Templates use `{placeholder}` markers: `{topic}` and `{count}` for question
/// generation, `{topic}` and `{answers}` for feedback.
#[derive(Debug, Clone)]
pub struct PromptSet {
    questions: String,
    feedback: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            questions: include_str!("../prompts/generate_questions.md").to_string(),
            feedback: include_str!("../prompts/generate_feedback.md").to_string(),
        }
    }
}

impl PromptSet {
    /// Builds a prompt set from templates keyed by name, falling back to the
    /// built-in template for any key that is missing.
    pub fn from_map(mut prompts: HashMap<String, String>) -> Self {
        let mut set = Self::default();
        if let Some(questions) = prompts.remove(QUESTIONS_PROMPT_KEY) {
            set.questions = questions;
        }
        if let Some(feedback) = prompts.remove(FEEDBACK_PROMPT_KEY) {
            set.feedback = feedback;
        }
        for unused in prompts.keys() {
            tracing::warn!("Ignoring unknown prompt template '{}'", unused);
        }
        set
    }

    pub fn questions_prompt(&self, topic: &str, count: usize) -> String {
        fill(
            &self.questions,
            &[("topic", topic), ("count", &count.to_string())],
        )
    }

    pub fn feedback_prompt(&self, topic: &str, answers: &[Answer]) -> Result<String> {
        let answers = serde_json::to_string_pretty(answers)
            .context("Failed to serialize answers for the feedback prompt")?;
        Ok(fill(&self.feedback, &[("topic", topic), ("answers", &answers)]))
    }
}

/// Replaces `{key}` markers in one left-to-right pass, so substituted text
/// is never scanned for markers again.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut filled = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        filled.push_str(&rest[..start]);
        let marker = &rest[start + 1..];
        let found = values
            .iter()
            .find(|(key, _)| marker.starts_with(key) && marker[key.len()..].starts_with('}'));
        match found {
            Some((key, value)) => {
                filled.push_str(value);
                rest = &marker[key.len() + 1..];
            }
            None => {
                filled.push('{');
                rest = marker;
            }
        }
    }
    filled.push_str(rest);
    filled
}
