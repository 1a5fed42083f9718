//! Outbound message formatting and delivery.
//!
//! Two styles exist: bot-branded notices and anonymous twin relays. Delivery
//! is fire-and-forget: one background worker drains a single queue in order,
//! failures are logged and never retried.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, oneshot},
    time::sleep,
};
use tracing::{debug, warn};

use crate::{
    domain::{ConversationId, MemberId},
    messaging::{port::MessagingPort, types::Persona},
    Result,
};

pub const BOT_DISPLAY_NAME: &str = "Twin Lunch Bot";
pub const BOT_ICON: &str = "robot_face";
pub const NOTICE_MARKER: &str = "_bip bip_";
pub const TWIN_DISPLAY_NAME: &str = "Ton Twin Lunch";
pub const TWIN_ICON: &str = "question";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Resolved to the member's direct conversation at delivery time.
    Member(MemberId),
    Conversation(ConversationId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Style {
    Notice,
    Relay,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outbound {
    pub target: Target,
    pub style: Style,
    pub text: String,
}

impl Outbound {
    pub fn notice_to_member(member: &MemberId, text: impl Into<String>) -> Self {
        Self {
            target: Target::Member(member.clone()),
            style: Style::Notice,
            text: text.into(),
        }
    }

    pub fn notice_to_conversation(conversation: &ConversationId, text: impl Into<String>) -> Self {
        Self {
            target: Target::Conversation(conversation.clone()),
            style: Style::Notice,
            text: text.into(),
        }
    }

    pub fn relay_to_member(member: &MemberId, text: impl Into<String>) -> Self {
        Self {
            target: Target::Member(member.clone()),
            style: Style::Relay,
            text: text.into(),
        }
    }
}

enum Job {
    Batch(Vec<Outbound>),
    Flush(oneshot::Sender<()>),
}

/// Handle to the delivery worker.
///
/// Cloning is cheap; every clone feeds the same queue, so messages leave in
/// the order they were handed over, across batches and callers.
#[derive(Clone)]
pub struct Notifier {
    jobs: mpsc::UnboundedSender<Job>,
}

impl Notifier {
    /// Spawn the delivery worker. `spacing` is waited before each message so
    /// consecutive messages show up in order and never all at once.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(messenger: Arc<dyn MessagingPort>, spacing: Duration) -> Self {
        // Unbounded: callers never wait on delivery.
        let (jobs, rx) = mpsc::unbounded_channel();
        let courier = Courier {
            messenger,
            bot: Persona::new(BOT_DISPLAY_NAME, BOT_ICON),
            twin: Persona::new(TWIN_DISPLAY_NAME, TWIN_ICON),
            spacing,
        };
        tokio::spawn(courier.run(rx));
        Self { jobs }
    }

    pub fn send(&self, msg: Outbound) {
        self.dispatch(vec![msg]);
    }

    /// Queue `batch` for in-order delivery after everything queued before it.
    pub fn dispatch(&self, batch: Vec<Outbound>) {
        if batch.is_empty() {
            return;
        }
        if self.jobs.send(Job::Batch(batch)).is_err() {
            warn!("delivery worker stopped, dropping outbound messages");
        }
    }

    /// Wait until every message queued so far has been delivered (or failed).
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.jobs.send(Job::Flush(done)).is_err() {
            return;
        }
        let _ = wait.await;
    }
}

struct Courier {
    messenger: Arc<dyn MessagingPort>,
    bot: Persona,
    twin: Persona,
    spacing: Duration,
}

impl Courier {
    async fn run(self, mut jobs: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = jobs.recv().await {
            match job {
                Job::Batch(batch) => {
                    for msg in batch {
                        if !self.spacing.is_zero() {
                            sleep(self.spacing).await;
                        }
                        if let Err(e) = self.deliver(&msg).await {
                            warn!(target_kind = ?msg.target, style = ?msg.style, error = %e, "error sending message");
                        }
                    }
                }
                Job::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("all notifier handles dropped, delivery worker done");
    }

    /// Final text and persona for a message of the given style.
    fn render(&self, style: Style, text: &str) -> (String, &Persona) {
        match style {
            Style::Notice => (format!("{NOTICE_MARKER} {text}"), &self.bot),
            Style::Relay => (text.to_string(), &self.twin),
        }
    }

    async fn deliver(&self, msg: &Outbound) -> Result<()> {
        let conversation = match &msg.target {
            Target::Conversation(c) => c.clone(),
            Target::Member(m) => self.messenger.open_direct_conversation(m).await?,
        };
        let (text, persona) = self.render(msg.style, &msg.text);
        self.messenger.post(&conversation, &text, persona).await?;
        debug!(conversation = %conversation, style = ?msg.style, "message sent");
        Ok(())
    }
}
