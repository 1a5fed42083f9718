use crate::domain::{ConversationId, MemberId};

/// Platform-agnostic inbound event model.
///
/// Slack-specific fields stay in the Slack adapter.
#[derive(Clone, Debug)]
pub enum IncomingEvent {
    Message(MessageEvent),
    Command(CommandEvent),
    /// Anything else the transport delivered (joins, edits, reactions, ...).
    Other { kind: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversationKind {
    /// One-to-one conversation between a member and the bot.
    Direct,
    /// Multi-party direct conversation.
    Group,
    Channel,
    Unknown,
}

#[derive(Clone, Debug)]
pub struct MessageEvent {
    pub sender: MemberId,
    pub conversation: ConversationId,
    pub conversation_kind: ConversationKind,
    /// Set when the message was posted by a bot or integration.
    pub bot_id: Option<String>,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct CommandEvent {
    pub issuer: MemberId,
    /// Command name as typed, e.g. `/twinlunch-add`.
    pub name: String,
    pub text: String,
}

/// Display identity a message is posted under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Persona {
    pub display_name: String,
    pub icon_emoji: String,
}

impl Persona {
    pub fn new(display_name: impl Into<String>, icon_emoji: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            icon_emoji: icon_emoji.into(),
        }
    }
}
