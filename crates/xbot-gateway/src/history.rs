//! History commands: summary, question answering, chat replies and stats.

use crate::error::GatewayError;
use log::info;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use xbot_ai::{TextGenerator, generate_with_fallback};
use xbot_archive::{
    ContextWindow, MessageArchive, PromptStore, SenderActivity, activity_leaderboard,
};

const SUMMARY_SYSTEM_PROMPT: &str = "You are an assistant that summarizes conversations. \
Give a concise summary of the key points discussed, focusing on the main topics, \
the questions raised and the decisions made.";
const SUMMARY_PREFIX: &str =
    "This is a Telegram chat history. Summarize the main topics discussed:\n\n";
const ASK_PREFIX: &str = "This is a Telegram chat history:\n\n";

/// Reply shown when there is nothing to summarize.
pub const NO_MESSAGES_TO_SUMMARIZE: &str = "No messages found to summarize.";
/// Reply shown when there is no history to answer from.
pub const NO_HISTORY_FOR_QUESTION: &str = "No chat history found to answer your question.";
/// Reply shown for an empty question.
pub const QUESTION_REQUIRED: &str = "Please provide a question. For example: \
What did we decide about the project deadline?";

/// Result of a generated history reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryReply {
    /// Generated text, or the fixed notice when nothing was generated.
    pub text: String,
    /// Model that produced `text`.
    pub model: Option<String>,
    /// Records read from the archive.
    pub processed: usize,
    /// Generation time.
    pub elapsed_ms: u64,
}

impl HistoryReply {
    fn notice(text: &str) -> Self {
        Self {
            text: text.to_string(),
            model: None,
            processed: 0,
            elapsed_ms: 0,
        }
    }
}

/// Tunables for [`HistoryService`].
#[derive(Debug, Clone)]
pub struct HistorySettings {
    /// Candidate models for summaries and answers, tried in order.
    pub summary_models: Vec<String>,
    /// Model used for direct chat replies.
    pub chat_model: String,
    /// Records rendered into a prompt.
    pub max_records: usize,
    /// Rows returned by the leaderboard.
    pub leaderboard_limit: usize,
}

/// Answers history commands for one gateway.
#[derive(Clone)]
pub struct HistoryService {
    archive: MessageArchive,
    prompts: Arc<PromptStore>,
    generator: Arc<dyn TextGenerator>,
    settings: HistorySettings,
}

impl HistoryService {
    pub fn new(
        archive: MessageArchive,
        prompts: Arc<PromptStore>,
        generator: Arc<dyn TextGenerator>,
        settings: HistorySettings,
    ) -> Self {
        Self {
            archive,
            prompts,
            generator,
            settings,
        }
    }

    /// Summarize the retrievable history of a conversation.
    pub async fn summarize(&self, chat_id: i64) -> Result<HistoryReply, GatewayError> {
        self.generate_over_history(
            chat_id,
            SUMMARY_SYSTEM_PROMPT.to_string(),
            SUMMARY_PREFIX,
            NO_MESSAGES_TO_SUMMARIZE,
        )
        .await
    }

    /// Answer `question` from the retrievable history of a conversation.
    pub async fn ask(&self, chat_id: i64, question: &str) -> Result<HistoryReply, GatewayError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(GatewayError::BadRequest(QUESTION_REQUIRED.to_string()));
        }
        let system_prompt = format!(
            "You are an assistant that finds answers in a conversation history. \
Using the chat log provided, answer the user's question: '{question}'. If the log \
does not contain enough information, say so honestly and offer suggestions based on \
what is there."
        );
        self.generate_over_history(chat_id, system_prompt, ASK_PREFIX, NO_HISTORY_FOR_QUESTION)
            .await
    }

    /// Reply to a single message using the conversation's system prompt.
    pub async fn chat(&self, chat_id: i64, message: &str) -> Result<HistoryReply, GatewayError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(GatewayError::BadRequest("Message text is required.".to_string()));
        }
        let system_prompt = self.prompts.system_prompt(chat_id).await?;
        let started = Instant::now();
        let text = self
            .generator
            .generate_text(&self.settings.chat_model, &system_prompt, message)
            .await?;
        Ok(HistoryReply {
            text,
            model: Some(self.settings.chat_model.clone()),
            processed: 0,
            elapsed_ms: elapsed_ms(started),
        })
    }

    /// Most active senders in the retrievable history.
    pub async fn leaderboard(&self, chat_id: i64) -> Result<Vec<SenderActivity>, GatewayError> {
        let records = self.archive.get_messages_by_conversation(chat_id).await?;
        Ok(activity_leaderboard(
            &records,
            self.settings.leaderboard_limit,
        ))
    }

    /// Rendered context window, capped at `limit` (or the configured bound).
    pub async fn transcript(
        &self,
        chat_id: i64,
        limit: Option<usize>,
    ) -> Result<String, GatewayError> {
        let records = self.archive.get_messages_by_conversation(chat_id).await?;
        let max_records = limit
            .unwrap_or(self.settings.max_records)
            .min(self.settings.max_records);
        Ok(ContextWindow::new(max_records).render(records))
    }

    async fn generate_over_history(
        &self,
        chat_id: i64,
        system_prompt: String,
        prefix: &str,
        empty_notice: &str,
    ) -> Result<HistoryReply, GatewayError> {
        let records = self.archive.get_messages_by_conversation(chat_id).await?;
        info!(
            "chat history loaded (chat_id={}, records={})",
            chat_id,
            records.len()
        );
        if records.is_empty() {
            return Ok(HistoryReply::notice(empty_notice));
        }
        let processed = records.len();
        let transcript = ContextWindow::new(self.settings.max_records)
            .with_prefix(prefix)
            .render(records);

        let started = Instant::now();
        let outcome = generate_with_fallback(
            self.generator.as_ref(),
            &self.settings.summary_models,
            &system_prompt,
            &transcript,
        )
        .await?;
        let elapsed_ms = elapsed_ms(started);
        info!(
            "history reply generated (chat_id={}, model={}, chars={}, elapsed_ms={})",
            chat_id,
            outcome.model,
            outcome.text.len(),
            elapsed_ms
        );
        Ok(HistoryReply {
            text: outcome.text,
            model: Some(outcome.model),
            processed,
            elapsed_ms,
        })
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::{HistoryService, HistorySettings, NO_MESSAGES_TO_SUMMARIZE};
    use crate::error::GatewayError;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use xbot_ai::{AiError, TextGenerator};
    use xbot_archive::{
        DocumentBackend, MESSAGES_COLLECTION, MemoryCollection, MessageArchive,
        PROMPTS_COLLECTION, PromptStore, UpdatePayload,
    };

    struct Echo;

    #[async_trait::async_trait]
    impl TextGenerator for Echo {
        async fn generate_text(
            &self,
            model: &str,
            system_prompt: &str,
            user_prompt: &str,
        ) -> Result<String, AiError> {
            Ok(format!("{model}|{system_prompt}|{user_prompt}"))
        }
    }

    fn service() -> HistoryService {
        let archive = MessageArchive::new(Arc::new(DocumentBackend::new(Arc::new(
            MemoryCollection::new(MESSAGES_COLLECTION),
        ))));
        let prompts = Arc::new(PromptStore::new(Arc::new(MemoryCollection::new(
            PROMPTS_COLLECTION,
        ))));
        HistoryService::new(
            archive,
            prompts,
            Arc::new(Echo),
            HistorySettings {
                summary_models: vec!["m1".to_string()],
                chat_model: "chat".to_string(),
                max_records: 2,
                leaderboard_limit: 10,
            },
        )
    }

    async fn say(service: &HistoryService, chat_id: i64, user: &str, text: &str) {
        service
            .archive
            .save_update(UpdatePayload::new(json!({
                "message": { "chat": { "id": chat_id }, "from": { "id": 1, "username": user }, "text": text }
            })))
            .await
            .expect("save");
    }

    #[tokio::test]
    async fn empty_history_returns_notice_without_generation() {
        let reply = service().summarize(1).await.expect("reply");
        assert_eq!(reply.text, NO_MESSAGES_TO_SUMMARIZE);
        assert_eq!(reply.model, None);
    }

    #[tokio::test]
    async fn summary_uses_bounded_window() {
        let service = service();
        for text in ["one", "two", "three"] {
            say(&service, 4, "ada", text).await;
        }
        let reply = service.summarize(4).await.expect("reply");
        assert_eq!(reply.model.as_deref(), Some("m1"));
        assert_eq!(reply.processed, 3);
        assert!(reply.text.ends_with("@ada: two\n@ada: three\n"), "{}", reply.text);
        assert!(!reply.text.contains("@ada: one"));
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let err = service().ask(4, "   ").await.expect_err("rejected");
        assert!(matches!(err, GatewayError::BadRequest(_)));
    }

    #[tokio::test]
    async fn chat_uses_default_prompt_until_saved() {
        let service = service();
        let reply = service.chat(9, "hello").await.expect("reply");
        assert_eq!(reply.text, "chat|You are a helpful assistant.|hello");

        service.prompts.save_prompt(9, "Be brief.").await.expect("save");
        let reply = service.chat(9, "hello").await.expect("reply");
        assert_eq!(reply.text, "chat|Be brief.|hello");
    }

    #[tokio::test]
    async fn transcript_limit_never_exceeds_configured_bound() {
        let service = service();
        for text in ["a", "b", "c"] {
            say(&service, 2, "ada", text).await;
        }
        let transcript = service.transcript(2, Some(10)).await.expect("transcript");
        assert_eq!(transcript, "@ada: b\n@ada: c\n");
        let transcript = service.transcript(2, Some(1)).await.expect("transcript");
        assert_eq!(transcript, "@ada: c\n");
    }
}
