use crate::console_speech::ConsoleSpeech;
use anyhow::{Context, Result, bail};
use interview_core::runtime::SessionHandle;
use interview_core::types::{SessionSnapshot, SessionStatus};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};

/// Walks one interview through the terminal.
///
/// The answer control is pressed on the user's behalf as soon as a question
/// has been read out, so each answer is a single typed line.
pub async fn run_console<R, W>(
    handle: SessionHandle,
    io: Arc<ConsoleSpeech<R, W>>,
    topic: Option<String>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    let topic = match topic {
        Some(topic) => topic,
        None => {
            io.print("What topic would you like to be interviewed on?").await?;
            match io.read_line().await? {
                Some(topic) => topic,
                None => bail!("No topic provided"),
            }
        }
    };

    let mut snapshots = handle.subscribe();
    handle.submit_topic(topic).await?;
    io.print("Generating questions...").await?;

    let prepared = snapshots
        .wait_for(|s| (s.status == SessionStatus::Ready && !s.speaking) || s.notice.is_some())
        .await
        .context("Interview session stopped unexpectedly")?
        .clone();
    if prepared.status != SessionStatus::Ready {
        let notice = prepared.notice.unwrap_or_default();
        io.print(&format!("Could not start the interview: {notice}")).await?;
        return Ok(());
    }

    io.print(&format!(
        "{} questions on \"{}\" are ready. Press Enter to begin.",
        prepared.questions.len(),
        prepared.topic
    ))
    .await?;
    if io.read_line().await?.is_none() {
        return Ok(());
    }
    handle.begin().await?;

    loop {
        let snapshot = snapshots
            .wait_for(|s| s.status == SessionStatus::Completed || awaiting_answer(s))
            .await
            .context("Interview session stopped unexpectedly")?
            .clone();
        if snapshot.status == SessionStatus::Completed {
            break;
        }
        if io.is_closed() {
            io.print("Input closed, ending the interview.").await?;
            return Ok(());
        }
        handle.answer_button_pressed().await?;
        // The runner publishes once per input, so this is the press landing.
        snapshots.changed().await?;
    }

    let finished = snapshots
        .wait_for(|s| (s.feedback.is_some() && !s.speaking) || s.notice.is_some())
        .await
        .context("Interview session stopped unexpectedly")?
        .clone();
    io.print(&render_report(&finished)).await
}

fn awaiting_answer(snapshot: &SessionSnapshot) -> bool {
    snapshot.status == SessionStatus::Interviewing
        && !snapshot.speaking
        && !snapshot.is_listening
        && !snapshot.current_question_answered()
}

fn render_report(snapshot: &SessionSnapshot) -> String {
    let Some(feedback) = &snapshot.feedback else {
        let notice = snapshot.notice.as_deref().unwrap_or("no details");
        return format!("\nFeedback is not available: {notice}");
    };

    let mut report = format!("\n=== Feedback: {} ===\n\n{}\n", snapshot.topic, feedback.overall_feedback);
    for (idx, item) in feedback.detailed_feedback.iter().enumerate() {
        let answer = snapshot
            .answers
            .iter()
            .find(|a| a.question == item.question)
            .map(|a| a.answer.as_str())
            .unwrap_or("(no answer recorded)");
        report.push_str(&format!(
            "\n{}. {}\n   Your answer:  {}\n   Feedback:     {}\n   Ideal answer: {}\n",
            idx + 1,
            item.question,
            answer,
            item.feedback,
            item.ideal_answer
        ));
    }
    report
}
