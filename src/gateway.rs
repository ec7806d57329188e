use anyhow::Result;
use async_trait::async_trait;

use crate::state::Turn;

/// The remote text-generation endpoint
///
/// `history` is every stored turn before the newest user message; `prompt` is
/// that newest message. One call, one reply, no retry.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn generate(&self, history: &[Turn], prompt: &str) -> Result<String>;

    /// Name shown in the page header
    fn model_name(&self) -> &str;
}
