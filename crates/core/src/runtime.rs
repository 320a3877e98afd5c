//! Runs an `InterviewSession` as a single owner task.
//!
//! Inputs are processed strictly one at a time. After every input the runner
//! publishes a fresh `SessionSnapshot` on a watch channel, which is the only
//! view presentation layers get. Commands go out on an mpsc channel to
//! whatever executes speech: `drive_speech` for a local `SpeechIo`, or a
//! remote client that reports completions back as `Input`s.

use crate::{
    Command, Input,
    error::{ProviderCancelled, SessionError},
    interviewer::Interviewer,
    session_state::InterviewSession,
    speech::SpeechIo,
    types::{Answer, Feedback, Question, SessionSnapshot, SessionStatus},
};
use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SPEECH_TIMEOUT: Duration = Duration::from_secs(120);

const INPUT_CHANNEL_SIZE: usize = 128;
const COMMAND_CHANNEL_SIZE: usize = 32;

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    /// Upper bound on each question or feedback request.
    pub provider_timeout: Duration,
    /// Assumed speech availability until the speech executor reports in.
    pub speech_available: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            speech_available: true,
        }
    }
}

type SharedToken = Arc<Mutex<CancellationToken>>;

fn current_token(shared: &SharedToken) -> CancellationToken {
    shared
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Wraps the real interviewer with a per-call timeout and cancellation.
struct GuardedInterviewer {
    inner: Arc<dyn Interviewer>,
    timeout: Duration,
    cancel: SharedToken,
}

impl GuardedInterviewer {
    async fn guard<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let token = current_token(&self.cancel);
        tokio::select! {
            _ = token.cancelled() => Err(ProviderCancelled(operation).into()),
            result = tokio::time::timeout(self.timeout, call) => result.map_err(|_| {
                anyhow::anyhow!("{} timed out after {:?}", operation, self.timeout)
            })?,
        }
    }
}

#[async_trait]
impl Interviewer for GuardedInterviewer {
    async fn generate_questions(&self, topic: &str) -> Result<Vec<Question>> {
        self.guard("Question generation", self.inner.generate_questions(topic))
            .await
    }

    async fn generate_feedback(&self, topic: &str, answers: &[Answer]) -> Result<Feedback> {
        self.guard(
            "Feedback generation",
            self.inner.generate_feedback(topic, answers),
        )
        .await
    }
}

/// Cloneable access to a running session: intents in, snapshots out.
#[derive(Clone)]
pub struct SessionHandle {
    input_tx: mpsc::Sender<Input>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    cancel: SharedToken,
}

impl SessionHandle {
    pub async fn send(&self, input: Input) -> Result<(), SessionError> {
        self.input_tx
            .send(input)
            .await
            .map_err(|_| SessionError::RuntimeClosed)
    }

    /// Starts a new session for `topic`, aborting any provider call still in flight.
    ///
    /// A blank topic is rejected here and leaves the running session alone.
    pub async fn submit_topic(&self, topic: impl Into<String>) -> Result<(), SessionError> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(SessionError::EmptyTopic);
        }
        self.cancel_in_flight();
        self.send(Input::SubmitTopic(topic)).await
    }

    pub async fn begin(&self) -> Result<(), SessionError> {
        self.send(Input::Begin).await
    }

    pub async fn answer_button_pressed(&self) -> Result<(), SessionError> {
        self.send(Input::AnswerButtonPressed).await
    }

    pub async fn reset(&self) -> Result<(), SessionError> {
        self.cancel_in_flight();
        self.send(Input::Reset).await
    }

    /// Stops the runner, which in turn closes the command channel.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.cancel_in_flight();
        self.send(Input::Shutdown).await
    }

    pub fn cancel_in_flight(&self) {
        let mut token = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        token.cancel();
        *token = CancellationToken::new();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }
}

struct SessionRunner {
    session: InterviewSession,
    interviewer: GuardedInterviewer,
    command_tx: mpsc::Sender<Command>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    input_rx: mpsc::Receiver<Input>,
}

impl SessionRunner {
    async fn run(mut self) {
        tracing::debug!("Interview session runner started");
        while let Some(input) = self.input_rx.recv().await {
            if input == Input::Shutdown {
                break;
            }
            self.handle_input(input).await;
            self.snapshot_tx.send_replace(self.session.snapshot());
        }
        tracing::info!("Interview session runner stopped");
    }

    async fn handle_input(&mut self, input: Input) {
        tracing::trace!("Handling input: {:?}", input);
        let result = match input {
            Input::SubmitTopic(topic) if topic.trim().is_empty() => Err(SessionError::EmptyTopic),
            Input::SubmitTopic(topic) => {
                if self.session.status() != SessionStatus::Idle {
                    self.session.reset();
                }
                self.session
                    .start_interview(&self.interviewer, &topic, &self.command_tx)
                    .await
            }
            Input::Begin => self.session.begin_questioning(&self.command_tx).await,
            Input::AnswerButtonPressed => {
                self.session
                    .answer_button_pressed(&self.command_tx)
                    .await
            }
            Input::Reset => {
                self.session.reset();
                Ok(())
            }
            Input::Shutdown => Ok(()),
            Input::UtteranceFinished(utterance_id) => {
                self.session
                    .on_utterance_finished(utterance_id, &self.command_tx)
                    .await
            }
            Input::ListenFinished(transcript) => {
                self.session
                    .on_listen_finished(&self.interviewer, transcript, &self.command_tx)
                    .await
            }
            Input::SpeechAvailability(available) => {
                self.session.set_speech_available(available);
                Ok(())
            }
        };

        if let Err(e) = result {
            if matches!(e, SessionError::Cancelled) {
                tracing::debug!("Superseded provider call was cancelled");
            } else if e.is_generation_failure() {
                tracing::error!("{}", e);
                self.session.set_notice(e.to_string());
            } else {
                tracing::warn!("Ignoring input: {}", e);
            }
        }
    }
}

/// Spawns the session owner task on the current tokio runtime.
///
/// Returns the handle for intents and snapshots, plus the receiving end of
/// the command channel, which the caller must hand to a speech executor.
pub fn spawn_session(
    interviewer: Arc<dyn Interviewer>,
    settings: RuntimeSettings,
) -> (SessionHandle, mpsc::Receiver<Command>) {
    let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_SIZE);
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    let session = InterviewSession::new(settings.speech_available);
    let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
    let cancel: SharedToken = Arc::new(Mutex::new(CancellationToken::new()));

    let runner = SessionRunner {
        session,
        interviewer: GuardedInterviewer {
            inner: interviewer,
            timeout: settings.provider_timeout,
            cancel: cancel.clone(),
        },
        command_tx,
        snapshot_tx,
        input_rx,
    };
    tokio::spawn(runner.run());

    (
        SessionHandle {
            input_tx,
            snapshot_rx,
            cancel,
        },
        command_rx,
    )
}

/// Executes commands against a local speech capability, one at a time, and
/// reports each completion back to the session.
///
/// If the capability is missing, commands are dropped and nothing is
/// reported, so the session never advances on speech.
pub async fn drive_speech(
    mut commands: mpsc::Receiver<Command>,
    speech: Arc<dyn SpeechIo>,
    handle: SessionHandle,
    speech_timeout: Duration,
) {
    let available = speech.is_available();
    if handle
        .send(Input::SpeechAvailability(available))
        .await
        .is_err()
    {
        return;
    }

    while let Some(command) = commands.recv().await {
        if !available {
            tracing::debug!("Speech unavailable, dropping {:?}", command);
            continue;
        }

        let input = match command {
            Command::Speak { utterance_id, text } => {
                match tokio::time::timeout(speech_timeout, speech.speak(&text)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!("Failed to speak utterance {}: {:?}", utterance_id, e),
                    Err(_) => tracing::warn!(
                        "Utterance {} did not finish within {:?}",
                        utterance_id,
                        speech_timeout
                    ),
                }
                // A failed or stalled utterance is over as far as pacing goes.
                Input::UtteranceFinished(utterance_id)
            }
            Command::Listen => {
                let transcript =
                    match tokio::time::timeout(speech_timeout, speech.listen_once()).await {
                        Ok(Ok(transcript)) => transcript,
                        Ok(Err(e)) => {
                            tracing::error!("Failed to capture answer: {:?}", e);
                            None
                        }
                        Err(_) => {
                            tracing::warn!("No answer captured within {:?}", speech_timeout);
                            None
                        }
                    };
                Input::ListenFinished(transcript)
            }
        };

        if handle.send(input).await.is_err() {
            break;
        }
    }
    tracing::debug!("Speech driver stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interviewer::MockInterviewer;
    use crate::session_state::{ACKNOWLEDGMENT, CLOSING_REMARK, READINESS_PROMPT};
    use crate::speech::{MockSpeechIo, UnavailableSpeech};
    use crate::types::FeedbackItem;
    use std::collections::VecDeque;

    const WAIT: Duration = Duration::from_secs(5);

    /// Speaks instantly and answers from a script.
    #[derive(Default)]
    struct ScriptedSpeech {
        answers: Mutex<VecDeque<String>>,
        spoken: Mutex<Vec<String>>,
    }

    impl ScriptedSpeech {
        fn with_answers(answers: &[&str]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
                spoken: Mutex::new(vec![]),
            }
        }

        fn spoken(&self) -> Vec<String> {
            self.spoken.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SpeechIo for ScriptedSpeech {
        fn is_available(&self) -> bool {
            true
        }

        async fn speak(&self, text: &str) -> Result<()> {
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn listen_once(&self) -> Result<Option<String>> {
            Ok(self.answers.lock().unwrap().pop_front())
        }
    }

    /// Hangs on the topic "slow"; answers any other topic immediately.
    struct SlowInterviewer;

    #[async_trait]
    impl Interviewer for SlowInterviewer {
        async fn generate_questions(&self, topic: &str) -> Result<Vec<Question>> {
            if topic == "slow" {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(vec![Question::new(format!("Tell me about {topic}."))])
        }

        async fn generate_feedback(&self, _topic: &str, _answers: &[Answer]) -> Result<Feedback> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            anyhow::bail!("unreachable in tests")
        }
    }

    async fn wait_for(
        handle: &SessionHandle,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        let mut rx = handle.subscribe();
        tokio::time::timeout(WAIT, rx.wait_for(predicate))
            .await
            .expect("timed out waiting for session state")
            .expect("session runner stopped")
            .clone()
    }

    #[tokio::test]
    async fn test_full_session_with_scripted_speech() {
        // --- Arrange ---
        let mut interviewer = MockInterviewer::new();
        interviewer
            .expect_generate_questions()
            .returning(|_| Ok(vec![Question::new("Q1"), Question::new("Q2")]))
            .once();
        interviewer
            .expect_generate_feedback()
            .withf(|topic, answers| topic == "databases" && answers.len() == 2)
            .returning(|_, answers| {
                Ok(Feedback {
                    overall_feedback: "Well done.".to_string(),
                    detailed_feedback: answers
                        .iter()
                        .map(|a| FeedbackItem {
                            question: a.question.clone(),
                            feedback: "Fine.".to_string(),
                            ideal_answer: "Ideal.".to_string(),
                        })
                        .collect(),
                })
            })
            .once();
        let speech = Arc::new(ScriptedSpeech::with_answers(&["answer one", "answer two"]));
        let (handle, commands) = spawn_session(Arc::new(interviewer), RuntimeSettings::default());
        tokio::spawn(drive_speech(commands, speech.clone(), handle.clone(), WAIT));

        // --- Act ---
        handle.submit_topic("databases").await.unwrap();
        wait_for(&handle, |s| s.status == SessionStatus::Ready && !s.speaking).await;
        handle.begin().await.unwrap();

        for idx in 0..2 {
            wait_for(&handle, |s| {
                s.current_question_index == Some(idx)
                    && !s.speaking
                    && !s.is_listening
                    && !s.current_question_answered()
            })
            .await;
            handle.answer_button_pressed().await.unwrap();
        }
        let done = wait_for(&handle, |s| s.feedback.is_some() && !s.speaking).await;

        // --- Assert ---
        assert_eq!(done.status, SessionStatus::Completed);
        assert_eq!(done.answers[0].answer, "answer one");
        assert_eq!(done.answers[1].answer, "answer two");
        assert_eq!(
            speech.spoken(),
            vec![
                READINESS_PROMPT.to_string(),
                "Q1".to_string(),
                ACKNOWLEDGMENT.to_string(),
                "Q2".to_string(),
                CLOSING_REMARK.to_string(),
                "Well done.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_unavailable_speech_does_not_advance() {
        let mut interviewer = MockInterviewer::new();
        interviewer
            .expect_generate_questions()
            .returning(|_| Ok(vec![Question::new("Q1"), Question::new("Q2")]));
        interviewer.expect_generate_feedback().never();
        let (handle, commands) = spawn_session(Arc::new(interviewer), RuntimeSettings::default());
        tokio::spawn(drive_speech(
            commands,
            Arc::new(UnavailableSpeech),
            handle.clone(),
            WAIT,
        ));
        wait_for(&handle, |s| !s.speech_available).await;

        handle.submit_topic("databases").await.unwrap();
        wait_for(&handle, |s| s.status == SessionStatus::Ready).await;
        handle.begin().await.unwrap();
        wait_for(&handle, |s| s.status == SessionStatus::Interviewing).await;
        handle.answer_button_pressed().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.current_question_index, Some(0));
        assert!(!snapshot.is_listening);
        assert!(!snapshot.speaking);
        assert!(snapshot.answers.is_empty());
        assert!(snapshot.notice.is_none());
    }

    #[tokio::test]
    async fn test_provider_timeout_leaves_session_idle_with_notice() {
        let settings = RuntimeSettings {
            provider_timeout: Duration::from_millis(50),
            speech_available: false,
        };
        let (handle, _commands) = spawn_session(Arc::new(SlowInterviewer), settings);

        handle.submit_topic("slow").await.unwrap();
        let snapshot = wait_for(&handle, |s| s.notice.is_some()).await;

        assert_eq!(snapshot.status, SessionStatus::Idle);
        assert!(snapshot.questions.is_empty());
        assert!(snapshot.notice.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_new_topic_cancels_in_flight_generation() {
        let settings = RuntimeSettings {
            speech_available: false,
            ..RuntimeSettings::default()
        };
        let (handle, _commands) = spawn_session(Arc::new(SlowInterviewer), settings);

        handle.submit_topic("slow").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.submit_topic("caching").await.unwrap();

        let snapshot = wait_for(&handle, |s| s.status == SessionStatus::Ready).await;
        assert_eq!(snapshot.topic, "caching");
        assert_eq!(snapshot.questions[0].question, "Tell me about caching.");
        assert!(snapshot.notice.is_none());
    }

    #[tokio::test]
    async fn test_blank_topic_leaves_running_session_alone() {
        let (handle, _commands) =
            spawn_session(Arc::new(SlowInterviewer), RuntimeSettings::default());
        handle.submit_topic("caching").await.unwrap();
        wait_for(&handle, |s| s.status == SessionStatus::Ready).await;
        handle.begin().await.unwrap();
        wait_for(&handle, |s| s.status == SessionStatus::Interviewing).await;

        assert!(matches!(
            handle.submit_topic("   ").await,
            Err(SessionError::EmptyTopic)
        ));
        // A raw input bypassing the handle check is rejected by the runner too.
        handle
            .send(Input::SubmitTopic("\t".to_string()))
            .await
            .unwrap();
        // Processed after the blank topic, so its snapshot shows the outcome.
        handle.send(Input::SpeechAvailability(false)).await.unwrap();
        let snapshot = wait_for(&handle, |s| !s.speech_available).await;

        assert_eq!(snapshot.status, SessionStatus::Interviewing);
        assert_eq!(snapshot.topic, "caching");
        assert_eq!(snapshot.questions.len(), 1);
        assert_eq!(snapshot.current_question_index, Some(0));
        assert!(snapshot.notice.is_none());
    }

    #[tokio::test]
    async fn test_superseded_generation_shows_no_notice() {
        let settings = RuntimeSettings {
            speech_available: false,
            ..RuntimeSettings::default()
        };
        let (handle, _commands) = spawn_session(Arc::new(SlowInterviewer), settings);

        handle.submit_topic("slow").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        // The replacement hangs as well, so the session stays idle meanwhile.
        handle.submit_topic("slow").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.status, SessionStatus::Idle);
        assert!(snapshot.notice.is_none());
    }

    #[tokio::test]
    async fn test_failed_utterance_still_completes() {
        let mut interviewer = MockInterviewer::new();
        interviewer
            .expect_generate_questions()
            .returning(|_| Ok(vec![Question::new("Q1")]));
        let mut speech = MockSpeechIo::new();
        speech.expect_is_available().return_const(true);
        speech
            .expect_speak()
            .returning(|_| Err(anyhow::anyhow!("audio device lost")));
        speech.expect_listen_once().never();
        let (handle, commands) = spawn_session(Arc::new(interviewer), RuntimeSettings::default());
        tokio::spawn(drive_speech(commands, Arc::new(speech), handle.clone(), WAIT));

        handle.submit_topic("databases").await.unwrap();
        let snapshot = wait_for(&handle, |s| s.status == SessionStatus::Ready && !s.speaking).await;

        assert!(snapshot.speech_available);
    }

    #[tokio::test]
    async fn test_shutdown_closes_command_channel() {
        let (handle, mut commands) =
            spawn_session(Arc::new(MockInterviewer::new()), RuntimeSettings::default());

        handle.shutdown().await.unwrap();

        let closed = tokio::time::timeout(WAIT, commands.recv()).await.unwrap();
        assert!(closed.is_none());
        assert!(matches!(
            handle.begin().await,
            Err(SessionError::RuntimeClosed)
        ));
    }
}
