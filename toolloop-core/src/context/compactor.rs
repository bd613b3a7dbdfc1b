//! Summary-based history compaction

use std::sync::Arc;

use tracing::{debug, info};

use super::config::ContextConfig;
use super::estimator::{estimate_tokens, is_over_threshold};
use crate::error::{Result, ToolloopError};
use crate::llm::{complete_text, GenerationSettings, LLMProvider, Message, Role};

/// Prefix of the synthetic user message carrying a summary
pub const SUMMARY_PREFIX: &str = "[Summary of the conversation so far]";

/// Acknowledgment the synthetic assistant message carries
pub const SUMMARY_ACK: &str =
    "Understood. I have the context of our earlier conversation and will continue from there.";

/// Result of a compaction
#[derive(Debug, Clone)]
pub struct CompactionResult {
    /// Replacement history: the two-message seed
    pub messages: Vec<Message>,
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub summary: String,
}

/// Replaces history with a generated summary
#[derive(Clone)]
pub struct Compactor {
    provider: Arc<dyn LLMProvider>,
    config: ContextConfig,
}

impl Compactor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: ContextConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Whether the estimated size of `messages` crosses the configured threshold
    pub fn needs_compaction(&self, messages: &[Message]) -> bool {
        let estimate = estimate_tokens(messages);
        is_over_threshold(
            estimate.total,
            self.config.context_window,
            self.config.threshold,
        )
    }

    /// Summarize the non-system messages and return the two-message seed.
    ///
    /// Empty input (or input with only system messages) compacts to empty.
    pub async fn compact(&self, messages: &[Message]) -> Result<Vec<Message>> {
        Ok(self.compact_detailed(messages).await?.messages)
    }

    /// Like [`Compactor::compact`], with before/after token estimates
    pub async fn compact_detailed(&self, messages: &[Message]) -> Result<CompactionResult> {
        let tokens_before = estimate_tokens(messages).total;
        let conversation: Vec<&Message> =
            messages.iter().filter(|m| m.role != Role::System).collect();

        if conversation.is_empty() {
            return Ok(CompactionResult {
                messages: Vec::new(),
                tokens_before,
                tokens_after: 0,
                summary: String::new(),
            });
        }

        let transcript = conversation
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str(), m.content.render()))
            .collect::<Vec<_>>()
            .join("\n\n");

        debug!(messages = conversation.len(), tokens_before, "Compacting history");
        let summary = self.generate_summary(&transcript).await?;
        if summary.is_empty() {
            return Err(ToolloopError::Compaction(
                "summary came back empty".to_string(),
            ));
        }

        let seed = summary_seed(&summary);
        let tokens_after = estimate_tokens(&seed).total;
        info!(tokens_before, tokens_after, "Compacted history");

        Ok(CompactionResult {
            messages: seed,
            tokens_before,
            tokens_after,
            summary,
        })
    }

    async fn generate_summary(&self, transcript: &str) -> Result<String> {
        let prompt = format!(
            r#"Summarize the following conversation concisely, preserving key facts, decisions, file names, tool results and open tasks that matter for continuing it:

{}

Summary:"#,
            transcript
        );

        let settings = GenerationSettings::new()
            .with_temperature(self.config.summary_temperature)
            .with_max_tokens(self.config.summary_max_tokens);

        complete_text(self.provider.as_ref(), prompt, settings)
            .await
            .map_err(|e| ToolloopError::Compaction(e.to_string()))
    }
}

/// The two-message seed standing in for a summarized history
pub fn summary_seed(summary: &str) -> Vec<Message> {
    vec![
        Message::user(format!("{}\n{}", SUMMARY_PREFIX, summary)),
        Message::assistant(SUMMARY_ACK),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenerationResponse, ScriptedProvider};
    use crate::llm::scripted::ScriptedTurn;

    fn compactor(provider: Arc<ScriptedProvider>) -> Compactor {
        Compactor::new(provider, ContextConfig::default())
    }

    #[tokio::test]
    async fn test_compact_returns_two_message_seed() {
        let provider = Arc::new(ScriptedProvider::from_responses(vec![
            GenerationResponse::text("  User asked to list /tmp; it holds a and b.txt.  "),
        ]));
        let history = vec![
            Message::system("You are a file assistant"),
            Message::user("List files in /tmp"),
            Message::assistant("There is a directory a and a file b.txt"),
        ];

        let seed = compactor(provider.clone()).compact(&history).await.unwrap();

        assert_eq!(seed.len(), 2);
        assert_eq!(seed[0].role, Role::User);
        assert!(seed[0].text().starts_with(SUMMARY_PREFIX));
        assert!(seed[0].text().ends_with("it holds a and b.txt."));
        assert_eq!(seed[1].role, Role::Assistant);

        let request = &provider.requests().await[0];
        let prompt = request.messages[0].text();
        assert!(prompt.contains("user: List files in /tmp"));
        assert!(!prompt.contains("You are a file assistant"));
        assert_eq!(request.settings.temperature, Some(0.3));
    }

    #[tokio::test]
    async fn test_compacting_a_seed_yields_a_seed() {
        let provider = Arc::new(ScriptedProvider::from_responses(vec![
            GenerationResponse::text("first summary"),
            GenerationResponse::text("second summary"),
        ]));
        let compactor = compactor(provider);

        let once = compactor
            .compact(&[Message::user("hi"), Message::assistant("hello")])
            .await
            .unwrap();
        let twice = compactor.compact(&once).await.unwrap();

        assert_eq!(twice.len(), 2);
        assert_eq!(twice[0].role, Role::User);
        assert_eq!(twice[1].role, Role::Assistant);
        assert!(twice[0].text().contains("second summary"));
    }

    #[tokio::test]
    async fn test_empty_history_compacts_to_empty() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let compactor = compactor(provider.clone());

        assert!(compactor.compact(&[]).await.unwrap().is_empty());
        assert!(
            compactor
                .compact(&[Message::system("only system")])
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_is_compaction_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![ScriptedTurn::Fail(
            "overloaded".to_string(),
        )]));

        let err = compactor(provider)
            .compact(&[Message::user("hi")])
            .await
            .unwrap_err();

        assert!(matches!(err, ToolloopError::Compaction(ref m) if m.contains("overloaded")));
    }

    #[test]
    fn test_needs_compaction() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let compactor = Compactor::new(
            provider,
            ContextConfig::new().with_context_window(100).with_threshold(0.8),
        );

        assert!(!compactor.needs_compaction(&[Message::user("x".repeat(320))]));
        assert!(compactor.needs_compaction(&[Message::user("x".repeat(324))]));
    }
}
