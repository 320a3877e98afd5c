pub mod error;
pub mod gemini_interviewer;
pub mod interviewer;
pub mod prompts;
pub mod runtime;
pub mod schema;
pub mod session_state;
pub mod speech;
pub mod types;

/// Represents commands that the session issues to the speech runtime.
///
/// This enum decouples the session's decision-making from the runtime's
/// execution of side effects. Every command is answered by exactly one
/// `Input` once the runtime has carried it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Speak the given text; answered by `Input::UtteranceFinished` carrying
    /// the same `utterance_id`.
    Speak { utterance_id: u64, text: String },
    /// Capture one spoken answer; answered by `Input::ListenFinished`.
    Listen,
}

/// Events delivered to the session, one at a time.
///
/// The first group are user intents from a presentation layer, the second
/// are completion signals from the speech runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    SubmitTopic(String),
    Begin,
    AnswerButtonPressed,
    Reset,
    Shutdown,

    UtteranceFinished(u64),
    ListenFinished(Option<String>),
    SpeechAvailability(bool),
}
