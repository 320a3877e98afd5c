//! Validation of provider output before it reaches the session.
//!
//! Language models wrap JSON in markdown fences, pick between a bare array and
//! an object wrapper, or leave fields blank. Everything is normalized here so the
//! state machine only ever sees well-formed questions and feedback.

use crate::types::{Feedback, Question};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("response does not match the expected JSON shape: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response contained no questions")]
    NoQuestions,
    #[error("question {0} is blank")]
    BlankQuestion(usize),
    #[error("overall feedback is blank")]
    BlankOverallFeedback,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuestionsPayload {
    List(Vec<Question>),
    Wrapped { questions: Vec<Question> },
}

/// Strips a surrounding ```` ```json ```` fence if the model added one.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

pub fn parse_questions(raw: &str) -> Result<Vec<Question>, SchemaError> {
    let payload: QuestionsPayload = serde_json::from_str(strip_code_fence(raw))?;
    let questions = match payload {
        QuestionsPayload::List(questions) => questions,
        QuestionsPayload::Wrapped { questions } => questions,
    };

    if questions.is_empty() {
        return Err(SchemaError::NoQuestions);
    }

    questions
        .into_iter()
        .enumerate()
        .map(|(idx, q)| {
            let text = q.question.trim();
            if text.is_empty() {
                Err(SchemaError::BlankQuestion(idx))
            } else {
                Ok(Question::new(text))
            }
        })
        .collect()
}

pub fn parse_feedback(raw: &str) -> Result<Feedback, SchemaError> {
    let feedback: Feedback = serde_json::from_str(strip_code_fence(raw))?;
    if feedback.overall_feedback.trim().is_empty() {
        return Err(SchemaError::BlankOverallFeedback);
    }
    Ok(feedback)
}
