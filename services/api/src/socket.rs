use crate::protocol::{ClientMessage, ServerMessage};
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use interview_core::error::SessionError;
use interview_core::interviewer::Interviewer;
use interview_core::runtime::{RuntimeSettings, SessionHandle, spawn_session};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

const OUTBOUND_CHANNEL_SIZE: usize = 64;

/// Shared by every connection; each socket still gets its own session.
#[derive(Clone)]
pub struct AppState {
    pub interviewer: Arc<dyn Interviewer>,
    pub provider_timeout: Duration,
}

/// Runs one interview session for the lifetime of the socket.
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("WebSocket connection established");

    // Speech stays off until the browser announces what it supports.
    let (handle, mut commands) = spawn_session(
        state.interviewer,
        RuntimeSettings {
            provider_timeout: state.provider_timeout,
            speech_available: false,
        },
    );
    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_CHANNEL_SIZE);

    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode {:?}: {}", message, e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let command_out = out_tx.clone();
    tokio::spawn(async move {
        while let Some(command) = commands.recv().await {
            if command_out.send(command.into()).await.is_err() {
                break;
            }
        }
    });

    let mut snapshots = handle.subscribe();
    let snapshot_out = out_tx.clone();
    let snapshot_task = tokio::spawn(async move {
        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            if snapshot_out
                .send(ServerMessage::Snapshot(snapshot))
                .await
                .is_err()
            {
                break;
            }
            if snapshots.changed().await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(message) => match dispatch(&handle, message).await {
                    Ok(()) => {}
                    Err(SessionError::RuntimeClosed) => break,
                    Err(e) => {
                        let reply = ServerMessage::Error {
                            message: e.to_string(),
                        };
                        if out_tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                },
                Err(e) => {
                    warn!("Invalid client message: {}", e);
                    let reply = ServerMessage::Error {
                        message: format!("Invalid message: {e}"),
                    };
                    if out_tx.send(reply).await.is_err() {
                        break;
                    }
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                // Client disconnected.
                info!("WebSocket error: {}", e);
                break;
            }
        }
    }

    if let Err(e) = handle.shutdown().await {
        warn!("Session already stopped: {}", e);
    }
    snapshot_task.abort();
    drop(out_tx);
    if let Err(e) = writer.await {
        warn!("WebSocket writer task failed: {}", e);
    }
    info!("WebSocket connection closed");
}

/// Forwards one client message to the session.
pub async fn dispatch(handle: &SessionHandle, message: ClientMessage) -> Result<(), SessionError> {
    if let Some(input) = message.speech_input() {
        return handle.send(input).await;
    }
    match message {
        ClientMessage::SubmitTopic { topic } => handle.submit_topic(topic).await,
        ClientMessage::Begin => handle.begin().await,
        ClientMessage::AnswerButtonPressed => handle.answer_button_pressed().await,
        ClientMessage::Reset => handle.reset().await,
        ClientMessage::SpeechCapabilities { .. }
        | ClientMessage::UtteranceFinished { .. }
        | ClientMessage::Transcript { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use interview_core::types::{Answer, Feedback, Question, SessionStatus};
    use interview_core::{Command, Input};

    struct OneQuestion;

    #[async_trait]
    impl Interviewer for OneQuestion {
        async fn generate_questions(&self, _topic: &str) -> anyhow::Result<Vec<Question>> {
            Ok(vec![Question::new("What is sharding?")])
        }

        async fn generate_feedback(
            &self,
            _topic: &str,
            _answers: &[Answer],
        ) -> anyhow::Result<Feedback> {
            anyhow::bail!("not needed")
        }
    }

    async fn parse_and_dispatch(handle: &SessionHandle, json: &str) {
        let message: ClientMessage = serde_json::from_str(json).unwrap();
        dispatch(handle, message).await.unwrap();
    }

    #[tokio::test]
    async fn test_blank_topic_is_rejected_without_touching_session() {
        let (handle, _commands) = spawn_session(Arc::new(OneQuestion), RuntimeSettings::default());
        parse_and_dispatch(&handle, r#"{"type":"submit_topic","topic":"databases"}"#).await;
        let mut snapshots = handle.subscribe();
        snapshots
            .wait_for(|s| s.status == SessionStatus::Ready)
            .await
            .unwrap();

        let message: ClientMessage =
            serde_json::from_str(r#"{"type":"submit_topic","topic":"  "}"#).unwrap();
        let result = dispatch(&handle, message).await;

        assert!(matches!(result, Err(SessionError::EmptyTopic)));
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Ready);
        assert_eq!(snapshot.topic, "databases");
    }

    #[tokio::test]
    async fn test_browser_reported_speech_drives_session() {
        let settings = RuntimeSettings {
            speech_available: false,
            ..RuntimeSettings::default()
        };
        let (handle, mut commands) = spawn_session(Arc::new(OneQuestion), settings);

        parse_and_dispatch(&handle, r#"{"type":"speech_capabilities","available":true}"#).await;
        parse_and_dispatch(&handle, r#"{"type":"submit_topic","topic":"databases"}"#).await;

        let Some(Command::Speak { utterance_id, .. }) = commands.recv().await else {
            panic!("expected the readiness prompt");
        };
        parse_and_dispatch(
            &handle,
            &format!(r#"{{"type":"utterance_finished","utterance_id":{utterance_id}}}"#),
        )
        .await;
        parse_and_dispatch(&handle, r#"{"type":"begin"}"#).await;

        let Some(Command::Speak { utterance_id, text }) = commands.recv().await else {
            panic!("expected the first question");
        };
        assert_eq!(text, "What is sharding?");
        handle.send(Input::UtteranceFinished(utterance_id)).await.unwrap();
        parse_and_dispatch(&handle, r#"{"type":"answer_button_pressed"}"#).await;
        assert_eq!(commands.recv().await, Some(Command::Listen));
        parse_and_dispatch(&handle, r#"{"type":"transcript","text":"Splitting data"}"#).await;

        let mut snapshots = handle.subscribe();
        let snapshot = snapshots
            .wait_for(|s| s.status == SessionStatus::Completed)
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.answers[0].answer, "Splitting data");
        assert!(snapshot.speech_available);
    }
}
