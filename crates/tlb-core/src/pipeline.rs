//! Event pipeline: classifier stage + a single run loop owning the registry.
//!
//! The run loop is the only place the registry is touched, so commands and
//! message routing never run concurrently and no lock is needed. Events are
//! handled in the order they reached the classifier.

use tokio::{
    sync::mpsc::{self, error::TryRecvError},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{
    classifier::{run_classifier, Sequenced},
    commands::CommandInterpreter,
    messaging::types::{CommandEvent, IncomingEvent, MessageEvent},
    registry::PairingRegistry,
    router::Router,
};

/// Handle to a running pipeline.
pub struct Pipeline {
    events: mpsc::Sender<IncomingEvent>,
    classifier: JoinHandle<()>,
    run_loop: JoinHandle<PairingRegistry>,
}

impl Pipeline {
    /// Spawn the classifier and run-loop tasks, connected by channels holding
    /// at most `capacity` events each.
    pub fn spawn(
        registry: PairingRegistry,
        interpreter: CommandInterpreter,
        router: Router,
        capacity: usize,
    ) -> Self {
        let capacity = capacity.max(1);
        let (events_tx, events_rx) = mpsc::channel(capacity);
        let (messages_tx, messages_rx) = mpsc::channel(capacity);
        let (commands_tx, commands_rx) = mpsc::channel(capacity);

        let classifier = tokio::spawn(run_classifier(events_rx, messages_tx, commands_tx));
        let run_loop = tokio::spawn(run(
            registry,
            interpreter,
            router,
            messages_rx,
            commands_rx,
        ));

        info!(capacity, "pipeline started");
        Self {
            events: events_tx,
            classifier,
            run_loop,
        }
    }

    /// Sender the transport pushes inbound events into.
    ///
    /// A send completes once the event is queued; that is the hand-off point
    /// after which the transport acknowledges the event.
    pub fn events(&self) -> mpsc::Sender<IncomingEvent> {
        self.events.clone()
    }

    /// Close this handle's sender and wait for both stages to drain.
    ///
    /// Returns the final registry. Other clones of [`Pipeline::events`] must
    /// be dropped as well for this to complete.
    pub async fn shutdown(self) -> Option<PairingRegistry> {
        drop(self.events);
        let _ = self.classifier.await;
        self.run_loop.await.ok()
    }
}

/// Process messages and commands one at a time, in arrival order, until
/// both inputs close.
pub async fn run(
    mut registry: PairingRegistry,
    interpreter: CommandInterpreter,
    router: Router,
    mut messages: mpsc::Receiver<Sequenced<MessageEvent>>,
    mut commands: mpsc::Receiver<Sequenced<CommandEvent>>,
) -> PairingRegistry {
    let mut next_msg: Option<Sequenced<MessageEvent>> = None;
    let mut next_cmd: Option<Sequenced<CommandEvent>> = None;
    let mut messages_open = true;
    let mut commands_open = true;

    loop {
        // The classifier finishes sending an event before stamping the next
        // one, so anything older than a held event is already queued.
        if next_msg.is_none() && messages_open {
            match messages.try_recv() {
                Ok(msg) => next_msg = Some(msg),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => messages_open = false,
            }
        }
        if next_cmd.is_none() && commands_open {
            match commands.try_recv() {
                Ok(cmd) => next_cmd = Some(cmd),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => commands_open = false,
            }
        }

        if next_msg.is_none() && next_cmd.is_none() {
            if !messages_open && !commands_open {
                break;
            }
            tokio::select! {
                msg = messages.recv(), if messages_open => match msg {
                    Some(msg) => next_msg = Some(msg),
                    None => messages_open = false,
                },
                cmd = commands.recv(), if commands_open => match cmd {
                    Some(cmd) => next_cmd = Some(cmd),
                    None => commands_open = false,
                },
            }
            continue;
        }

        let command_first = match (&next_msg, &next_cmd) {
            (Some(msg), Some(cmd)) => cmd.seq < msg.seq,
            (None, Some(_)) => true,
            _ => false,
        };
        if command_first {
            if let Some(cmd) = next_cmd.take() {
                let outcome = interpreter.handle(&mut registry, &cmd.event).await;
                debug!(seq = cmd.seq, outcome = ?outcome, "command handled");
            }
        } else if let Some(msg) = next_msg.take() {
            let outcome = router.route(&registry, &msg.event);
            debug!(seq = msg.seq, outcome = ?outcome, "message routed");
        }
    }

    info!(pairs = registry.len(), "pipeline stopped");
    registry
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        domain::{ConversationId, MemberId},
        formatting,
        messaging::types::ConversationKind,
        notifier::Notifier,
        security::AdminAllowList,
        store::MemoryPairStore,
        testing::FakeMessenger,
    };

    fn dm(sender: &str, text: &str) -> IncomingEvent {
        IncomingEvent::Message(MessageEvent {
            sender: MemberId::new(sender),
            conversation: FakeMessenger::dm(sender),
            conversation_kind: ConversationKind::Direct,
            bot_id: None,
            text: text.to_string(),
        })
    }

    fn command(issuer: &str, name: &str, text: &str) -> IncomingEvent {
        IncomingEvent::Command(CommandEvent {
            issuer: MemberId::new(issuer),
            name: name.to_string(),
            text: text.to_string(),
        })
    }

    #[tokio::test]
    async fn end_to_end_pairing_and_relay() {
        let fake = Arc::new(FakeMessenger::default());
        let store = Arc::new(MemoryPairStore::new());
        let notifier = Notifier::new(fake.clone(), Duration::ZERO);
        let pipeline = Pipeline::spawn(
            PairingRegistry::new(store.clone()),
            CommandInterpreter::new(AdminAllowList::from_csv("UADMIN"), notifier.clone()),
            Router::new(notifier.clone()),
            4,
        );

        let events = pipeline.events();
        events
            .send(command("UADMIN", "/twinlunch-add", "<@U1|a> <@U2|b>"))
            .await
            .unwrap();
        events.send(dm("U1", "coucou")).await.unwrap();
        events.send(dm("U3", "et moi ?")).await.unwrap();
        events
            .send(IncomingEvent::Message(MessageEvent {
                sender: MemberId::new("U1"),
                conversation: ConversationId::new("C-general"),
                conversation_kind: ConversationKind::Channel,
                bot_id: None,
                text: "public".to_string(),
            }))
            .await
            .unwrap();
        drop(events);

        let registry = pipeline.shutdown().await.unwrap();
        notifier.flush().await;

        assert_eq!(registry.lookup(&MemberId::new("U2")), Some(&MemberId::new("U1")));
        assert_eq!(store.record_count(), 1);

        let relayed = fake.posts_to(&FakeMessenger::dm("U2"));
        assert!(relayed.iter().any(|p| p.text == "coucou"));
        let to_u3 = fake.posts_to(&FakeMessenger::dm("U3"));
        assert_eq!(to_u3.len(), 1);
        assert!(to_u3[0].text.ends_with(formatting::NO_TWIN));
        assert!(fake.posts_to(&ConversationId::new("C-general")).is_empty());
        assert!(fake.posts().iter().all(|p| p.text != "public"));
    }

    #[tokio::test]
    async fn store_failures_do_not_stop_the_pipeline() {
        let fake = Arc::new(FakeMessenger::default());
        let store = Arc::new(MemoryPairStore::new());
        store.set_unavailable(true);
        let notifier = Notifier::new(fake.clone(), Duration::ZERO);
        let pipeline = Pipeline::spawn(
            PairingRegistry::new(store.clone()),
            CommandInterpreter::new(AdminAllowList::from_csv("UADMIN"), notifier.clone()),
            Router::new(notifier.clone()),
            1,
        );

        let events = pipeline.events();
        events
            .send(command("UADMIN", "/twinlunch-add", "<@U1|a> <@U2|b>"))
            .await
            .unwrap();
        events.send(dm("U1", "hello")).await.unwrap();
        drop(events);

        let registry = pipeline.shutdown().await.unwrap();
        notifier.flush().await;

        assert!(registry.is_empty());
        let to_u1 = fake.posts_to(&FakeMessenger::dm("U1"));
        assert_eq!(to_u1.len(), 1);
        assert!(to_u1[0].text.ends_with(formatting::NO_TWIN));
    }

    #[tokio::test]
    async fn message_queued_before_a_removal_still_reaches_the_twin() {
        let fake = Arc::new(FakeMessenger::default());
        let store = Arc::new(MemoryPairStore::new());
        let mut registry = PairingRegistry::new(store.clone());
        registry
            .create(&MemberId::new("U1"), &MemberId::new("U2"))
            .await
            .unwrap();
        let notifier = Notifier::new(fake.clone(), Duration::ZERO);
        let pipeline = Pipeline::spawn(
            registry,
            CommandInterpreter::new(AdminAllowList::from_csv("UADMIN"), notifier.clone()),
            Router::new(notifier.clone()),
            8,
        );

        let events = pipeline.events();
        events.send(dm("U1", "avant")).await.unwrap();
        events
            .send(command("UADMIN", "/twinlunch-remove", "<@U1> <@U2>"))
            .await
            .unwrap();
        events.send(dm("U1", "après")).await.unwrap();
        drop(events);

        let registry = pipeline.shutdown().await.unwrap();
        notifier.flush().await;

        assert!(registry.is_empty());
        let to_u2: Vec<String> = fake
            .posts_to(&FakeMessenger::dm("U2"))
            .into_iter()
            .map(|p| p.text)
            .collect();
        assert_eq!(to_u2, vec!["avant"]);
        let to_u1 = fake.posts_to(&FakeMessenger::dm("U1"));
        assert_eq!(to_u1.len(), 1);
        assert!(to_u1[0].text.ends_with(formatting::NO_TWIN));
    }
}
