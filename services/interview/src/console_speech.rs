//! Terminal stand-in for speech: "speaking" prints a line and "listening"
//! reads one typed line as the final transcript.

use anyhow::{Context, Result};
use async_trait::async_trait;
use interview_core::speech::SpeechIo;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;

pub struct ConsoleSpeech<R, W> {
    reader: Mutex<R>,
    writer: Mutex<W>,
    closed: AtomicBool,
}

impl ConsoleSpeech<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsoleSpeech<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        }
    }

    /// Reads one line without its terminator. `None` once input is exhausted.
    pub async fn read_line(&self) -> Result<Option<String>> {
        let mut line = String::new();
        let read = self
            .reader
            .lock()
            .await
            .read_line(&mut line)
            .await
            .context("Failed to read from console")?;
        if read == 0 {
            self.closed.store(true, Ordering::SeqCst);
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    pub async fn print(&self, text: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(text.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await.context("Failed to write to console")
    }

    /// True once the input side has hit end of file.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader.into_inner(), self.writer.into_inner())
    }
}

#[async_trait]
impl<R, W> SpeechIo for ConsoleSpeech<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn is_available(&self) -> bool {
        true
    }

    async fn speak(&self, text: &str) -> Result<()> {
        self.print(&format!("Interviewer: {text}")).await
    }

    async fn listen_once(&self) -> Result<Option<String>> {
        self.print("You (type your answer, then Enter):").await?;
        let transcript = self.read_line().await?;
        Ok(transcript.filter(|line| !line.trim().is_empty()))
    }
}
