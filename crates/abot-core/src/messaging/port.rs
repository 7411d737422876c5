use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    Result,
};

/// Outbound port the core talks to.
///
/// Every call is best-effort: implementations log their own failures and the
/// core never retries. Handlers typically ignore the result.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Plain text.
    async fn send(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    /// Rich text (Telegram HTML subset).
    async fn send_formatted(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;

    /// Plain text that asks the client to reply to it.
    async fn send_force_reply(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    async fn send_file(
        &self,
        chat_id: ChatId,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<MessageRef>;

    async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>>;
}
