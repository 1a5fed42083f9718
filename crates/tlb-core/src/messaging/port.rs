use async_trait::async_trait;

use crate::{
    domain::{ConversationId, MemberId},
    messaging::types::Persona,
    Result,
};

/// Outbound side of the chat platform.
///
/// Slack is the first implementation; the core only needs to post plain text
/// under a display persona and to resolve a member's direct conversation.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn post(&self, destination: &ConversationId, text: &str, persona: &Persona)
        -> Result<()>;

    async fn open_direct_conversation(&self, member: &MemberId) -> Result<ConversationId>;
}
