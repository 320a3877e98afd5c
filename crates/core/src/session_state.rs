use crate::{
    Command,
    error::SessionError,
    interviewer::Interviewer,
    types::{Answer, Feedback, Question, SessionSnapshot, SessionStatus},
};
use std::collections::VecDeque;
use tokio::sync::mpsc::Sender;

pub const READINESS_PROMPT: &str = "Let's begin. Are you ready to start?";
pub const ACKNOWLEDGMENT: &str = "Thank you. Let's move to the next question.";
pub const CLOSING_REMARK: &str =
    "Thank you for completing the interview. I'll now analyze your responses.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UtteranceKind {
    ReadinessPrompt,
    Question(usize),
    Acknowledgment,
    ClosingRemark,
    OverallFeedback,
}

#[derive(Debug, Clone, Copy)]
struct PendingUtterance {
    id: u64,
    kind: UtteranceKind,
}

/// The interview session state machine.
///
/// Owns every piece of session data. Presentation layers only ever see a
/// `SessionSnapshot`. Side effects leave through `Command`s on the command
/// channel; their completions come back through the `on_*` methods.
#[derive(Debug)]
pub struct InterviewSession {
    status: SessionStatus,
    topic: String,
    questions: Vec<Question>,
    current_question_idx: Option<usize>,
    answers: Vec<Answer>,
    feedback: Option<Feedback>,
    feedback_requested: bool,
    utterances: VecDeque<PendingUtterance>,
    // Survives `reset` so completions from an abandoned session never match.
    next_utterance_id: u64,
    is_listening: bool,
    speech_available: bool,
    notice: Option<String>,
}

impl InterviewSession {
    pub fn new(speech_available: bool) -> Self {
        Self {
            status: SessionStatus::Idle,
            topic: String::new(),
            questions: vec![],
            current_question_idx: None,
            answers: vec![],
            feedback: None,
            feedback_requested: false,
            utterances: VecDeque::new(),
            next_utterance_id: 0,
            is_listening: false,
            speech_available,
            notice: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_question_idx(&self) -> Option<usize> {
        self.current_question_idx
    }

    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    pub fn feedback(&self) -> Option<&Feedback> {
        self.feedback.as_ref()
    }

    pub fn is_listening(&self) -> bool {
        self.is_listening
    }

    pub fn is_speaking(&self) -> bool {
        !self.utterances.is_empty()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            topic: self.topic.clone(),
            questions: self.questions.clone(),
            current_question_index: self.current_question_idx,
            answers: self.answers.clone(),
            feedback: self.feedback.clone(),
            is_listening: self.is_listening,
            speaking: self.is_speaking(),
            speech_available: self.speech_available,
            notice: self.notice.clone(),
        }
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    pub fn set_speech_available(&mut self, available: bool) {
        if self.speech_available != available {
            tracing::info!(
                "Speech capability is now {}",
                if available { "available" } else { "unavailable" }
            );
        }
        self.speech_available = available;
        if !available {
            // Nothing will ever complete these.
            self.is_listening = false;
            self.utterances.clear();
        }
    }

    /// Abandons the current session and returns to a fresh `Idle` one.
    pub fn reset(&mut self) {
        tracing::info!("Resetting interview session (was {})", self.status);
        let next_utterance_id = self.next_utterance_id;
        *self = Self::new(self.speech_available);
        self.next_utterance_id = next_utterance_id;
    }

    fn expect_status(&self, expected: SessionStatus) -> Result<(), SessionError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                expected,
                actual: self.status,
            })
        }
    }

    /// Generates the questions for `topic` and moves `Idle -> Ready`.
    ///
    /// On failure the session stays `Idle` with no questions; retrying is up
    /// to the user.
    pub async fn start_interview<I: Interviewer + ?Sized>(
        &mut self,
        interviewer: &I,
        topic: &str,
        command_tx: &Sender<Command>,
    ) -> Result<(), SessionError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(SessionError::EmptyTopic);
        }
        self.expect_status(SessionStatus::Idle)?;

        tracing::info!("Generating interview questions for topic: '{}'", topic);
        let questions = interviewer
            .generate_questions(topic)
            .await
            .map_err(SessionError::from_provider)?;
        if questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }
        tracing::info!("Received {} questions", questions.len());

        self.topic = topic.to_string();
        self.questions = questions;
        self.status = SessionStatus::Ready;
        self.notice = None;
        self.speak(
            UtteranceKind::ReadinessPrompt,
            READINESS_PROMPT.to_string(),
            command_tx,
        )
        .await
    }

    pub async fn begin_questioning(&mut self, command_tx: &Sender<Command>) -> Result<(), SessionError> {
        self.expect_status(SessionStatus::Ready)?;
        if self.questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }
        self.status = SessionStatus::Interviewing;
        self.current_question_idx = Some(0);
        self.ask_current_question(command_tx).await
    }

    /// The user asked to answer the current question.
    pub async fn answer_button_pressed(
        &mut self,
        command_tx: &Sender<Command>,
    ) -> Result<(), SessionError> {
        self.expect_status(SessionStatus::Interviewing)?;
        if !self.speech_available {
            tracing::debug!("Ignoring answer request: speech capability unavailable");
            return Ok(());
        }
        if self.is_listening || self.is_speaking() {
            return Err(SessionError::Busy);
        }
        if self.current_question_idx.is_none() {
            return Err(SessionError::NoActiveQuestion);
        }

        command_tx
            .send(Command::Listen)
            .await
            .map_err(|_| SessionError::RuntimeClosed)?;
        self.is_listening = true;
        Ok(())
    }

    /// Completion of a `Command::Listen`.
    pub async fn on_listen_finished<I: Interviewer + ?Sized>(
        &mut self,
        interviewer: &I,
        transcript: Option<String>,
        command_tx: &Sender<Command>,
    ) -> Result<(), SessionError> {
        if !self.is_listening {
            tracing::warn!("Ignoring transcript: no answer was being captured");
            return Ok(());
        }
        self.is_listening = false;
        match transcript.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => self.on_speech_completed(interviewer, text, command_tx).await,
            None => {
                tracing::debug!("No speech recognized, waiting for another attempt");
                Ok(())
            }
        }
    }

    /// Records `text` as the answer to the current question and moves on.
    ///
    /// Answering the same question again replaces the earlier answer.
    pub async fn on_speech_completed<I: Interviewer + ?Sized>(
        &mut self,
        interviewer: &I,
        text: &str,
        command_tx: &Sender<Command>,
    ) -> Result<(), SessionError> {
        self.expect_status(SessionStatus::Interviewing)?;
        let idx = self
            .current_question_idx
            .filter(|&idx| idx < self.questions.len())
            .ok_or(SessionError::NoActiveQuestion)?;

        let answer = Answer {
            question: self.questions[idx].question.clone(),
            answer: text.to_string(),
        };
        if idx < self.answers.len() {
            tracing::debug!("Replacing answer for question {}", idx + 1);
            self.answers[idx] = answer;
        } else {
            debug_assert_eq!(self.answers.len(), idx);
            self.answers.push(answer);
        }
        tracing::info!("Recorded answer {}/{}", idx + 1, self.questions.len());

        if idx + 1 < self.questions.len() {
            // The next question follows once the acknowledgment has been spoken.
            if self.pending(UtteranceKind::Acknowledgment) {
                return Ok(());
            }
            self.speak(
                UtteranceKind::Acknowledgment,
                ACKNOWLEDGMENT.to_string(),
                command_tx,
            )
            .await
        } else {
            self.status = SessionStatus::Completed;
            self.speak(
                UtteranceKind::ClosingRemark,
                CLOSING_REMARK.to_string(),
                command_tx,
            )
            .await?;
            self.complete_interview(interviewer, command_tx).await
        }
    }

    /// Completion of a `Command::Speak`.
    pub async fn on_utterance_finished(
        &mut self,
        utterance_id: u64,
        command_tx: &Sender<Command>,
    ) -> Result<(), SessionError> {
        let Some(pos) = self.utterances.iter().position(|u| u.id == utterance_id) else {
            tracing::debug!("Ignoring completion of unknown utterance {}", utterance_id);
            return Ok(());
        };
        // Completions arrive in order; anything older was lost.
        let finished = self.utterances.drain(..=pos).last();

        match finished.map(|u| u.kind) {
            Some(UtteranceKind::Acknowledgment) => self.advance_to_next_question(command_tx).await,
            _ => Ok(()),
        }
    }

    /// Requests feedback on all answers. Runs at most once per session.
    ///
    /// On failure the session stays `Completed` without feedback.
    pub async fn complete_interview<I: Interviewer + ?Sized>(
        &mut self,
        interviewer: &I,
        command_tx: &Sender<Command>,
    ) -> Result<(), SessionError> {
        self.expect_status(SessionStatus::Completed)?;
        if self.feedback_requested {
            tracing::debug!("Feedback was already requested for this session");
            return Ok(());
        }
        self.feedback_requested = true;

        tracing::info!("Requesting feedback on {} answers", self.answers.len());
        let feedback = interviewer
            .generate_feedback(&self.topic, &self.answers)
            .await
            .map_err(SessionError::from_provider)?;

        let overall = feedback.overall_feedback.clone();
        self.feedback = Some(feedback);
        self.speak(UtteranceKind::OverallFeedback, overall, command_tx)
            .await
    }

    async fn advance_to_next_question(
        &mut self,
        command_tx: &Sender<Command>,
    ) -> Result<(), SessionError> {
        if self.status != SessionStatus::Interviewing {
            return Ok(());
        }
        let next = self.current_question_idx.map_or(0, |idx| idx + 1);
        if next >= self.questions.len() {
            tracing::warn!("No question left to advance to (index {})", next);
            return Ok(());
        }
        self.current_question_idx = Some(next);
        self.ask_current_question(command_tx).await
    }

    async fn ask_current_question(&mut self, command_tx: &Sender<Command>) -> Result<(), SessionError> {
        let idx = self
            .current_question_idx
            .ok_or(SessionError::NoActiveQuestion)?;
        let text = self
            .questions
            .get(idx)
            .ok_or(SessionError::NoActiveQuestion)?
            .question
            .clone();
        tracing::info!("Asking question {}/{}", idx + 1, self.questions.len());
        self.speak(UtteranceKind::Question(idx), text, command_tx)
            .await
    }

    fn pending(&self, kind: UtteranceKind) -> bool {
        self.utterances.iter().any(|u| u.kind == kind)
    }

    async fn speak(
        &mut self,
        kind: UtteranceKind,
        text: String,
        command_tx: &Sender<Command>,
    ) -> Result<(), SessionError> {
        if !self.speech_available {
            tracing::debug!("Speech unavailable, skipping utterance: {}", text);
            return Ok(());
        }
        let utterance_id = self.next_utterance_id;
        self.next_utterance_id += 1;

        command_tx
            .send(Command::Speak { utterance_id, text })
            .await
            .map_err(|_| SessionError::RuntimeClosed)?;
        self.utterances.push_back(PendingUtterance {
            id: utterance_id,
            kind,
        });
        Ok(())
    }
}
