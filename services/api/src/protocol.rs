//! JSON messages exchanged over `/ws`, tagged by `type`.
//!
//! The browser plays the speech provider: it receives `speak`/`listen`
//! requests and reports their completion back.

use interview_core::types::SessionSnapshot;
use interview_core::{Command, Input};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    SubmitTopic {
        topic: String,
    },
    Begin,
    AnswerButtonPressed,
    Reset,
    SpeechCapabilities {
        available: bool,
    },
    /// Echoes the id from the matching `speak` message.
    UtteranceFinished {
        utterance_id: u64,
    },
    /// Final transcript of a `listen`; `null` or absent when nothing was heard.
    Transcript {
        #[serde(default)]
        text: Option<String>,
    },
}

impl ClientMessage {
    /// Speech completions map straight onto session inputs; intents go
    /// through the `SessionHandle` methods instead.
    pub fn speech_input(&self) -> Option<Input> {
        match self {
            ClientMessage::SpeechCapabilities { available } => {
                Some(Input::SpeechAvailability(*available))
            }
            ClientMessage::UtteranceFinished { utterance_id } => {
                Some(Input::UtteranceFinished(*utterance_id))
            }
            ClientMessage::Transcript { text } => Some(Input::ListenFinished(text.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Snapshot(SessionSnapshot),
    Speak { utterance_id: u64, text: String },
    Listen,
    Error { message: String },
}

impl From<Command> for ServerMessage {
    fn from(command: Command) -> Self {
        match command {
            Command::Speak { utterance_id, text } => ServerMessage::Speak { utterance_id, text },
            Command::Listen => ServerMessage::Listen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interview_core::types::SessionStatus;
    use serde_json::json;

    #[test]
    fn test_parse_client_messages() {
        let topic: ClientMessage =
            serde_json::from_str(r#"{"type":"submit_topic","topic":"databases"}"#).unwrap();
        assert_eq!(
            topic,
            ClientMessage::SubmitTopic {
                topic: "databases".to_string()
            }
        );

        let press: ClientMessage =
            serde_json::from_str(r#"{"type":"answer_button_pressed"}"#).unwrap();
        assert_eq!(press, ClientMessage::AnswerButtonPressed);
        assert_eq!(press.speech_input(), None);

        let silent: ClientMessage = serde_json::from_str(r#"{"type":"transcript"}"#).unwrap();
        assert_eq!(silent.speech_input(), Some(Input::ListenFinished(None)));

        let done: ClientMessage =
            serde_json::from_str(r#"{"type":"utterance_finished","utterance_id":7}"#).unwrap();
        assert_eq!(done.speech_input(), Some(Input::UtteranceFinished(7)));
    }

    #[test]
    fn test_reject_unknown_message_type() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type":"skip_question"}"#);

        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_server_messages() {
        let speak = ServerMessage::from(Command::Speak {
            utterance_id: 3,
            text: "Q1".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&speak).unwrap(),
            json!({"type": "speak", "utterance_id": 3, "text": "Q1"})
        );

        let snapshot = ServerMessage::Snapshot(SessionSnapshot {
            status: SessionStatus::Ready,
            topic: "databases".to_string(),
            ..SessionSnapshot::default()
        });
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["type"], "snapshot");
        assert_eq!(value["status"], "ready");
        assert_eq!(value["currentQuestionIndex"], serde_json::Value::Null);
        assert_eq!(value["isListening"], false);
    }
}
