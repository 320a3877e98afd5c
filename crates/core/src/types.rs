use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub question: String,
}

impl Question {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }
}

/// The transcript recorded for one question.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub question: String,
    pub answer: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackItem {
    pub question: String,
    pub feedback: String,
    pub ideal_answer: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub overall_feedback: String,
    pub detailed_feedback: Vec<FeedbackItem>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Ready,
    Interviewing,
    Completed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Ready => "ready",
            SessionStatus::Interviewing => "interviewing",
            SessionStatus::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Read-only view of a session handed to presentation layers.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub topic: String,
    pub questions: Vec<Question>,
    pub current_question_index: Option<usize>,
    pub answers: Vec<Answer>,
    pub feedback: Option<Feedback>,
    pub is_listening: bool,
    pub speaking: bool,
    pub speech_available: bool,
    /// Last non-fatal failure the user should be told about.
    pub notice: Option<String>,
}

impl SessionSnapshot {
    /// True once the active question has an answer on record.
    pub fn current_question_answered(&self) -> bool {
        self.current_question_index
            .is_some_and(|idx| idx < self.answers.len())
    }
}
