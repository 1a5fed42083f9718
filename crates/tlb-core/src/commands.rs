//! Admin slash-commands: `/twinlunch-add`, `-remove`, `-list`, `-clear`.
//!
//! Every command produces exactly one notice to its issuer. Authorization and
//! argument validation happen before the registry is touched, so a rejected
//! command never mutates anything.

use tracing::{error, info};

use crate::{
    domain::{MemberId, Pair},
    formatting,
    messaging::types::CommandEvent,
    notifier::{Notifier, Outbound},
    registry::{PairingRegistry, RegistryError},
    security::AdminAllowList,
};

pub const ADD: &str = "twinlunch-add";
pub const REMOVE: &str = "twinlunch-remove";
pub const LIST: &str = "twinlunch-list";
pub const CLEAR: &str = "twinlunch-clear";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminCommand {
    Add,
    Remove,
    List,
    Clear,
}

impl AdminCommand {
    /// Accepts the name with or without its leading slash.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().trim_start_matches('/').to_lowercase().as_str() {
            ADD => Some(Self::Add),
            REMOVE => Some(Self::Remove),
            LIST => Some(Self::List),
            CLEAR => Some(Self::Clear),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Unauthorized,
    UnknownCommand,
    /// Bad arguments or a registry precondition failed; nothing changed.
    Rejected,
    Added(Pair),
    Removed(Pair),
    Listed(usize),
    Cleared,
    /// The store failed; nothing changed in memory.
    Failed,
}

pub struct CommandInterpreter {
    admins: AdminAllowList,
    notifier: Notifier,
}

impl CommandInterpreter {
    pub fn new(admins: AdminAllowList, notifier: Notifier) -> Self {
        Self { admins, notifier }
    }

    pub async fn handle(
        &self,
        registry: &mut PairingRegistry,
        cmd: &CommandEvent,
    ) -> CommandOutcome {
        if !self.admins.is_admin(&cmd.issuer) {
            info!(issuer = %cmd.issuer, command = %cmd.name, "unauthorized command");
            self.reply(&cmd.issuer, formatting::NOT_AUTHORIZED);
            return CommandOutcome::Unauthorized;
        }

        let Some(command) = AdminCommand::parse(&cmd.name) else {
            let known = [ADD, REMOVE, LIST, CLEAR].map(|c| format!("/{c}"));
            let known: Vec<&str> = known.iter().map(String::as_str).collect();
            self.reply(&cmd.issuer, formatting::unknown_command(&cmd.name, &known));
            return CommandOutcome::UnknownCommand;
        };

        info!(issuer = %cmd.issuer, command = ?command, "handling command");
        match command {
            AdminCommand::Add => self.add(registry, cmd).await,
            AdminCommand::Remove => self.remove(registry, cmd).await,
            AdminCommand::List => self.list(registry, cmd),
            AdminCommand::Clear => self.clear(registry, cmd).await,
        }
    }

    async fn add(&self, registry: &mut PairingRegistry, cmd: &CommandEvent) -> CommandOutcome {
        let Some((user1, user2)) = formatting::extract_two_mentions(&cmd.text) else {
            self.reply(&cmd.issuer, formatting::ADD_NEEDS_TWO);
            return CommandOutcome::Rejected;
        };

        match registry.create(&user1, &user2).await {
            Ok(()) => {
                // Confirmation first, then each twin learns about the pairing.
                self.notifier.dispatch(vec![
                    Outbound::notice_to_member(&cmd.issuer, formatting::paired(&user1, &user2)),
                    Outbound::notice_to_member(&user1, formatting::ONBOARDING),
                    Outbound::notice_to_member(&user2, formatting::ONBOARDING),
                ]);
                CommandOutcome::Added(Pair::new(user1, user2))
            }
            Err(RegistryError::SameUser) => {
                self.reply(&cmd.issuer, formatting::ADD_NEEDS_DIFFERENT);
                CommandOutcome::Rejected
            }
            Err(RegistryError::AlreadyPaired(member)) => {
                self.reply(&cmd.issuer, formatting::already_paired(&member));
                CommandOutcome::Rejected
            }
            Err(e) => self.failed(&cmd.issuer, "add", e),
        }
    }

    async fn remove(&self, registry: &mut PairingRegistry, cmd: &CommandEvent) -> CommandOutcome {
        let Some((user1, user2)) = formatting::extract_two_mentions(&cmd.text) else {
            self.reply(&cmd.issuer, formatting::REMOVE_NEEDS_TWO);
            return CommandOutcome::Rejected;
        };

        match registry.remove(&user1, &user2).await {
            Ok(()) => {
                self.reply(&cmd.issuer, formatting::removed(&user1, &user2));
                CommandOutcome::Removed(Pair::new(user1, user2))
            }
            Err(RegistryError::NotPaired(a, b)) => {
                self.reply(&cmd.issuer, formatting::not_paired(&a, &b));
                CommandOutcome::Rejected
            }
            Err(e) => self.failed(&cmd.issuer, "remove", e),
        }
    }

    fn list(&self, registry: &PairingRegistry, cmd: &CommandEvent) -> CommandOutcome {
        let pairs = registry.list();
        if pairs.is_empty() {
            self.reply(&cmd.issuer, formatting::NO_PAIRS);
        } else {
            self.reply(&cmd.issuer, formatting::pair_list(&pairs));
        }
        CommandOutcome::Listed(pairs.len())
    }

    async fn clear(&self, registry: &mut PairingRegistry, cmd: &CommandEvent) -> CommandOutcome {
        match registry.clear().await {
            Ok(()) => {
                self.reply(&cmd.issuer, formatting::CLEARED);
                CommandOutcome::Cleared
            }
            Err(e) => self.failed(&cmd.issuer, "clear", e),
        }
    }

    fn failed(&self, issuer: &MemberId, command: &str, e: RegistryError) -> CommandOutcome {
        error!(command, error = %e, "twin lunch command failed");
        self.reply(issuer, formatting::SOMETHING_WENT_WRONG);
        CommandOutcome::Failed
    }

    fn reply(&self, issuer: &MemberId, text: impl Into<String>) {
        self.notifier.send(Outbound::notice_to_member(issuer, text));
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{store::MemoryPairStore, testing::FakeMessenger};

    struct Harness {
        fake: Arc<FakeMessenger>,
        store: Arc<MemoryPairStore>,
        notifier: Notifier,
        interpreter: CommandInterpreter,
        registry: PairingRegistry,
    }

    impl Harness {
        fn new() -> Self {
            let fake = Arc::new(FakeMessenger::default());
            let store = Arc::new(MemoryPairStore::new());
            let notifier = Notifier::new(fake.clone(), Duration::ZERO);
            let interpreter =
                CommandInterpreter::new(AdminAllowList::from_csv("UADMIN"), notifier.clone());
            let registry = PairingRegistry::new(store.clone());
            Self {
                fake,
                store,
                notifier,
                interpreter,
                registry,
            }
        }

        async fn run(&mut self, issuer: &str, name: &str, text: &str) -> CommandOutcome {
            let cmd = CommandEvent {
                issuer: MemberId::new(issuer),
                name: name.to_string(),
                text: text.to_string(),
            };
            let outcome = self.interpreter.handle(&mut self.registry, &cmd).await;
            self.notifier.flush().await;
            outcome
        }

        fn texts_to(&self, member: &str) -> Vec<String> {
            self.fake
                .posts_to(&FakeMessenger::dm(member))
                .into_iter()
                .map(|p| p.text)
                .collect()
        }
    }

    fn m(id: &str) -> MemberId {
        MemberId::new(id)
    }

    #[test]
    fn parses_command_names() {
        assert_eq!(AdminCommand::parse("/twinlunch-add"), Some(AdminCommand::Add));
        assert_eq!(AdminCommand::parse("twinlunch-list"), Some(AdminCommand::List));
        assert_eq!(AdminCommand::parse("/TwinLunch-Clear"), Some(AdminCommand::Clear));
        assert_eq!(AdminCommand::parse("/twinlunch"), None);
    }

    #[tokio::test]
    async fn non_admin_gets_exactly_one_refusal_for_any_command() {
        let mut h = Harness::new();
        for (name, text) in [
            ("/twinlunch-add", "<@U1|a> <@U2|b>"),
            ("/twinlunch-remove", "<@U1|a> <@U2|b>"),
            ("/twinlunch-list", ""),
            ("/twinlunch-clear", ""),
            ("/whatever", "<@U1|a>"),
        ] {
            let before = h.fake.posts().len();
            assert_eq!(h.run("UBOB", name, text).await, CommandOutcome::Unauthorized);
            let after = h.fake.posts();
            assert_eq!(after.len(), before + 1);
            assert!(after[before].text.ends_with(formatting::NOT_AUTHORIZED));
            assert_eq!(after[before].destination, FakeMessenger::dm("UBOB"));
        }
        assert!(h.registry.is_empty());
        assert_eq!(h.store.record_count(), 0);
    }

    #[tokio::test]
    async fn add_pairs_and_notifies_everyone_in_order() {
        let mut h = Harness::new();
        let outcome = h
            .run("UADMIN", "/twinlunch-add", "<@U1|alice> avec <@U2|bob>")
            .await;

        assert_eq!(outcome, CommandOutcome::Added(Pair::new(m("U1"), m("U2"))));
        assert_eq!(h.registry.lookup(&m("U1")), Some(&m("U2")));

        let posts = h.fake.posts();
        assert_eq!(posts.len(), 3);
        assert_eq!(posts[0].destination, FakeMessenger::dm("UADMIN"));
        assert!(posts[0].text.contains("<@U1> et <@U2>"));
        assert_eq!(posts[1].destination, FakeMessenger::dm("U1"));
        assert_eq!(posts[2].destination, FakeMessenger::dm("U2"));
        assert!(posts[1].text.ends_with(formatting::ONBOARDING));
    }

    #[tokio::test]
    async fn add_validation_failures_do_not_mutate() {
        let mut h = Harness::new();
        h.run("UADMIN", "/twinlunch-add", "<@U1|a> <@U2|b>").await;
        let baseline = h.fake.posts().len();

        for text in ["", "<@U3|c>", "<@U3|c> <@U4|d> <@U5|e>", "<@U3|c> <@U3|c>"] {
            assert_eq!(
                h.run("UADMIN", "/twinlunch-add", text).await,
                CommandOutcome::Rejected
            );
        }
        assert_eq!(
            h.run("UADMIN", "/twinlunch-add", "<@U3|c> <@U2|b>").await,
            CommandOutcome::Rejected
        );

        let replies = h.texts_to("UADMIN");
        assert!(replies[1].ends_with(formatting::ADD_NEEDS_TWO));
        assert!(replies[2].ends_with(formatting::ADD_NEEDS_TWO));
        assert!(replies[3].ends_with(formatting::ADD_NEEDS_TWO));
        assert!(replies[4].ends_with(formatting::ADD_NEEDS_DIFFERENT));
        assert!(replies[5].ends_with(&formatting::already_paired(&m("U2"))));

        assert_eq!(h.fake.posts().len(), baseline + 5);
        assert_eq!(h.registry.len(), 1);
        assert_eq!(h.registry.lookup(&m("U3")), None);
        assert_eq!(h.store.record_count(), 1);
    }

    #[tokio::test]
    async fn remove_requires_mutual_twins() {
        let mut h = Harness::new();
        h.run("UADMIN", "/twinlunch-add", "<@U1|a> <@U2|b>").await;
        h.run("UADMIN", "/twinlunch-add", "<@U3|c> <@U4|d>").await;

        assert_eq!(
            h.run("UADMIN", "/twinlunch-remove", "<@U1|a> <@U3|c>").await,
            CommandOutcome::Rejected
        );
        assert_eq!(
            h.run("UADMIN", "/twinlunch-remove", "<@U1|a>").await,
            CommandOutcome::Rejected
        );
        assert_eq!(h.registry.len(), 2);

        assert_eq!(
            h.run("UADMIN", "/twinlunch-remove", "<@U2|b> <@U1|a>").await,
            CommandOutcome::Removed(Pair::new(m("U2"), m("U1")))
        );
        assert_eq!(h.registry.lookup(&m("U1")), None);
        assert_eq!(h.store.record_count(), 1);

        let replies = h.texts_to("UADMIN");
        assert!(replies[2].ends_with(&formatting::not_paired(&m("U1"), &m("U3"))));
        assert!(replies[3].ends_with(formatting::REMOVE_NEEDS_TWO));
        assert!(replies[4].ends_with(&formatting::removed(&m("U2"), &m("U1"))));
    }

    #[tokio::test]
    async fn list_and_clear() {
        let mut h = Harness::new();
        assert_eq!(
            h.run("UADMIN", "/twinlunch-list", "").await,
            CommandOutcome::Listed(0)
        );

        h.run("UADMIN", "/twinlunch-add", "<@U1|a> <@U2|b>").await;
        h.run("UADMIN", "/twinlunch-add", "<@U3|c> <@U4|d>").await;
        assert_eq!(
            h.run("UADMIN", "/twinlunch-list", "").await,
            CommandOutcome::Listed(2)
        );

        assert_eq!(
            h.run("UADMIN", "/twinlunch-clear", "").await,
            CommandOutcome::Cleared
        );
        assert_eq!(
            h.run("UADMIN", "/twinlunch-list", "").await,
            CommandOutcome::Listed(0)
        );
        assert_eq!(h.store.record_count(), 0);

        let replies = h.texts_to("UADMIN");
        assert!(replies[0].ends_with(formatting::NO_PAIRS));
        assert!(replies[3].contains("• <@U1> et <@U2>\n• <@U3> et <@U4>"));
        assert!(replies[4].ends_with(formatting::CLEARED));
        assert!(replies[5].ends_with(formatting::NO_PAIRS));
    }

    #[tokio::test]
    async fn store_failure_reports_generic_error_and_keeps_state() {
        let mut h = Harness::new();
        h.run("UADMIN", "/twinlunch-add", "<@U1|a> <@U2|b>").await;
        h.store.set_unavailable(true);

        assert_eq!(
            h.run("UADMIN", "/twinlunch-remove", "<@U1|a> <@U2|b>").await,
            CommandOutcome::Failed
        );
        assert_eq!(
            h.run("UADMIN", "/twinlunch-clear", "").await,
            CommandOutcome::Failed
        );
        assert_eq!(
            h.run("UADMIN", "/twinlunch-add", "<@U3|c> <@U4|d>").await,
            CommandOutcome::Failed
        );

        assert_eq!(h.registry.lookup(&m("U1")), Some(&m("U2")));
        assert_eq!(h.registry.lookup(&m("U3")), None);
        let replies = h.texts_to("UADMIN");
        assert_eq!(replies.len(), 4);
        assert!(replies[1..]
            .iter()
            .all(|r| r.ends_with(formatting::SOMETHING_WENT_WRONG)));
        // No onboarding for a pair that was never stored.
        assert!(h.texts_to("U3").is_empty());
    }

    #[tokio::test]
    async fn unknown_command_from_admin_is_answered() {
        let mut h = Harness::new();
        assert_eq!(
            h.run("UADMIN", "/twinlunch-shuffle", "").await,
            CommandOutcome::UnknownCommand
        );
        let replies = h.texts_to("UADMIN");
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("/twinlunch-add"));
    }
}
