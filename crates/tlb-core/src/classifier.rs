//! First pipeline stage: split raw events into direct messages and commands.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::messaging::types::{CommandEvent, ConversationKind, IncomingEvent, MessageEvent};

#[derive(Clone, Debug)]
pub enum Classified {
    Message(MessageEvent),
    Command(CommandEvent),
    Dropped(DropReason),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    FromBot,
    NotDirect(ConversationKind),
    EmptyText,
    Unsupported(String),
}

pub fn classify(event: IncomingEvent) -> Classified {
    match event {
        IncomingEvent::Message(msg) => {
            if msg.bot_id.as_deref().is_some_and(|id| !id.is_empty()) {
                return Classified::Dropped(DropReason::FromBot);
            }
            if msg.conversation_kind != ConversationKind::Direct {
                return Classified::Dropped(DropReason::NotDirect(msg.conversation_kind));
            }
            if msg.text.trim().is_empty() {
                return Classified::Dropped(DropReason::EmptyText);
            }
            Classified::Message(msg)
        }
        IncomingEvent::Command(cmd) => Classified::Command(cmd),
        IncomingEvent::Other { kind } => Classified::Dropped(DropReason::Unsupported(kind)),
    }
}

/// An accepted event tagged with its position in the inbound stream.
///
/// Stamps increase across both output channels, so a consumer reading both
/// can restore arrival order.
#[derive(Clone, Debug)]
pub struct Sequenced<T> {
    pub seq: u64,
    pub event: T,
}

/// Run the classifier until `events` closes or both outputs are gone.
pub async fn run_classifier(
    mut events: mpsc::Receiver<IncomingEvent>,
    messages: mpsc::Sender<Sequenced<MessageEvent>>,
    commands: mpsc::Sender<Sequenced<CommandEvent>>,
) {
    let mut seq = 0u64;
    while let Some(event) = events.recv().await {
        match classify(event) {
            Classified::Message(msg) => {
                seq += 1;
                if messages.send(Sequenced { seq, event: msg }).await.is_err() {
                    warn!("message stage closed, stopping classifier");
                    return;
                }
            }
            Classified::Command(cmd) => {
                seq += 1;
                if commands.send(Sequenced { seq, event: cmd }).await.is_err() {
                    warn!("command stage closed, stopping classifier");
                    return;
                }
            }
            Classified::Dropped(DropReason::Unsupported(kind)) => {
                debug!(kind = %kind, "ignoring event");
            }
            Classified::Dropped(reason) => {
                debug!(reason = ?reason, "dropping message");
            }
        }
    }
    debug!("event source closed, classifier done");
}
