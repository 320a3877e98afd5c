use crate::config::{Config, LlmProvider};
use gemini_client::GeminiClient;
use interview_core::gemini_interviewer::GeminiInterviewer;
use interview_core::interviewer::{Interviewer, OpenAiInterviewer};
use interview_core::prompts::PromptSet;
use std::sync::Arc;

/// Builds the question/feedback provider selected by `LLM_PROVIDER`.
pub fn build_interviewer(
    config: &Config,
    prompts: PromptSet,
    question_count: usize,
) -> Arc<dyn Interviewer> {
    tracing::info!(
        "Using {:?} provider with model '{}' ({} questions per interview)",
        config.provider,
        config.chat_model,
        question_count
    );
    match config.provider {
        LlmProvider::Gemini => {
            let client = GeminiClient::new(config.api_key.clone()).with_model(&config.chat_model);
            Arc::new(GeminiInterviewer::new(client, prompts).with_question_count(question_count))
        }
        LlmProvider::OpenAI => Arc::new(
            OpenAiInterviewer::new(config.api_key.clone(), config.chat_model.clone(), prompts)
                .with_question_count(question_count),
        ),
    }
}
