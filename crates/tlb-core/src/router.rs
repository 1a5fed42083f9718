//! Relay direct messages between twins.

use tracing::debug;

use crate::{
    domain::MemberId,
    formatting,
    messaging::types::MessageEvent,
    notifier::{Notifier, Outbound},
    registry::PairingRegistry,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    Relayed { to: MemberId },
    NoTwin,
}

pub struct Router {
    notifier: Notifier,
}

impl Router {
    pub fn new(notifier: Notifier) -> Self {
        Self { notifier }
    }

    /// Exactly one outbound message per inbound one.
    ///
    /// The relayed message carries the raw text only; nothing about the
    /// sender is added to it.
    pub fn route(&self, registry: &PairingRegistry, msg: &MessageEvent) -> RouteOutcome {
        match registry.lookup(&msg.sender) {
            Some(twin) => {
                debug!(to = %twin, "relaying message to twin");
                self.notifier
                    .send(Outbound::relay_to_member(twin, msg.text.clone()));
                RouteOutcome::Relayed { to: twin.clone() }
            }
            None => {
                debug!(sender = %msg.sender, "message from member without a twin");
                self.notifier.send(Outbound::notice_to_conversation(
                    &msg.conversation,
                    formatting::NO_TWIN,
                ));
                RouteOutcome::NoTwin
            }
        }
    }
}
