use crate::types::SessionStatus;

/// Failures surfaced by the interview session.
///
/// None of these are fatal: the runtime logs intent errors and turns
/// generation failures into a user-facing notice.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a topic is required to start an interview")]
    EmptyTopic,
    #[error("session is {actual}, expected {expected}")]
    InvalidState {
        expected: SessionStatus,
        actual: SessionStatus,
    },
    #[error("no question is currently being asked")]
    NoActiveQuestion,
    #[error("speech is in progress")]
    Busy,
    #[error("the provider returned no questions")]
    NoQuestions,
    #[error("generation failed: {0:#}")]
    Generation(anyhow::Error),
    #[error("generation was cancelled")]
    Cancelled,
    #[error("the session runtime has shut down")]
    RuntimeClosed,
}

/// Returned by a provider call that was aborted because its result is no
/// longer wanted.
#[derive(Debug, thiserror::Error)]
#[error("{0} was cancelled")]
pub struct ProviderCancelled(pub &'static str);

impl SessionError {
    /// Whether the user should see this error as a notice.
    pub fn is_generation_failure(&self) -> bool {
        matches!(self, SessionError::Generation(_) | SessionError::NoQuestions)
    }

    pub(crate) fn from_provider(error: anyhow::Error) -> Self {
        if error.is::<ProviderCancelled>() {
            SessionError::Cancelled
        } else {
            SessionError::Generation(error)
        }
    }
}
