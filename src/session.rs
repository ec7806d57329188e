use std::sync::Arc;

use anyhow::Result;

use crate::gateway::Gateway;
use crate::state::{Conversation, Notice, Turn};

/// A reply that has been asked for but not yet received
///
/// Carries owned copies so it can be moved into a spawned task.
#[derive(Debug, Clone)]
pub struct PendingReply {
    pub history: Vec<Turn>,
    pub prompt: String,
}

impl PendingReply {
    pub async fn run(self, gateway: Arc<dyn Gateway>) -> Result<String> {
        gateway.generate(&self.history, &self.prompt).await
    }
}

/// Per-session context: the conversation plus the gateway used to extend it
///
/// Built once when the session starts and dropped when it ends. Only one
/// submission is in flight at a time.
pub struct ChatSession {
    gateway: Arc<dyn Gateway>,
    conversation: Conversation,
    notices: Vec<Notice>,
    pending: Option<usize>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("gateway", &self.gateway.model_name())
            .field("conversation", &self.conversation)
            .field("notices", &self.notices)
            .field("pending", &self.pending)
            .finish()
    }
}

impl ChatSession {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            conversation: Conversation::new(),
            notices: Vec::new(),
            pending: None,
        }
    }

    pub fn gateway(&self) -> Arc<dyn Gateway> {
        Arc::clone(&self.gateway)
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    /// Record the user's message and return what the gateway needs.
    ///
    /// Returns `None` for blank input or while a reply is still pending.
    pub fn begin(&mut self, input: &str) -> Option<PendingReply> {
        if input.trim().is_empty() || self.pending.is_some() {
            return None;
        }

        // Context is everything before the new message
        let history = self.conversation.all().to_vec();

        self.conversation.append(Turn::user(input));
        self.pending = Some(self.conversation.len() - 1);

        tracing::info!(turns = self.conversation.len(), "user turn recorded");

        Some(PendingReply {
            history,
            prompt: input.to_string(),
        })
    }

    /// Apply the outcome of the pending request.
    ///
    /// A failure leaves the user turn without a model turn. It is not retried.
    pub fn complete(&mut self, result: Result<String>) {
        let Some(turn_index) = self.pending.take() else {
            tracing::warn!("reply arrived with no pending request");
            return;
        };

        match result {
            Ok(reply) => {
                self.conversation.append(Turn::model(reply));
                tracing::info!(turns = self.conversation.len(), "model turn recorded");
            }
            Err(err) => {
                tracing::warn!(turn_index, error = %format!("{:#}", err), "generation failed");
                self.notices.push(Notice {
                    turn_index,
                    message: format!("Lỗi: {:#}", err),
                });
            }
        }
    }

    /// `begin`, call the gateway, then `complete`, all in one await.
    ///
    /// Returns `false` if the input was refused.
    pub async fn submit(&mut self, input: &str) -> bool {
        let Some(pending) = self.begin(input) else {
            return false;
        };

        let result = pending.run(self.gateway()).await;
        self.complete(result);
        true
    }
}
