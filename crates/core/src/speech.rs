use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

/// The two speech capabilities the session relies on.
///
/// Both operations complete exactly once. Callers must check
/// `is_available` first: the capability may be missing entirely.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpeechIo: Send + Sync {
    fn is_available(&self) -> bool;

    /// Renders `text` as audio; resolves once playback has finished.
    async fn speak(&self, text: &str) -> Result<()>;

    /// Captures one utterance and resolves with its final transcript.
    /// `None` means nothing was recognized.
    async fn listen_once(&self) -> Result<Option<String>>;
}

/// Stand-in for an environment without speech support.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableSpeech;

#[async_trait]
impl SpeechIo for UnavailableSpeech {
    fn is_available(&self) -> bool {
        false
    }

    async fn speak(&self, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn listen_once(&self) -> Result<Option<String>> {
        Ok(None)
    }
}
