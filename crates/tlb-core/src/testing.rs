//! Test doubles shared by the core's unit tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    domain::{ConversationId, MemberId},
    errors::Error,
    messaging::{port::MessagingPort, types::Persona},
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Posted {
    pub destination: ConversationId,
    pub text: String,
    pub persona: Persona,
}

/// Records every post; a member's direct conversation is `D-<member>`.
#[derive(Default)]
pub struct FakeMessenger {
    posts: Mutex<Vec<Posted>>,
    fail_posts: AtomicBool,
    open_delays: Mutex<VecDeque<Duration>>,
}

impl FakeMessenger {
    pub fn failing() -> Self {
        let fake = Self::default();
        fake.fail_posts.store(true, Ordering::SeqCst);
        fake
    }

    /// Successive `open_direct_conversation` calls take these durations.
    pub fn with_open_delays(delays: impl IntoIterator<Item = Duration>) -> Self {
        let fake = Self::default();
        *fake.open_delays.lock().unwrap() = delays.into_iter().collect();
        fake
    }

    pub fn dm(member: &str) -> ConversationId {
        ConversationId(format!("D-{member}"))
    }

    pub fn posts(&self) -> Vec<Posted> {
        self.posts.lock().unwrap().clone()
    }

    pub fn posted_texts(&self) -> Vec<String> {
        self.posts().into_iter().map(|p| p.text).collect()
    }

    pub fn posts_to(&self, destination: &ConversationId) -> Vec<Posted> {
        self.posts()
            .into_iter()
            .filter(|p| &p.destination == destination)
            .collect()
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn post(
        &self,
        destination: &ConversationId,
        text: &str,
        persona: &Persona,
    ) -> Result<()> {
        if self.fail_posts.load(Ordering::SeqCst) {
            return Err(Error::Transport("fake post failure".to_string()));
        }
        self.posts.lock().unwrap().push(Posted {
            destination: destination.clone(),
            text: text.to_string(),
            persona: persona.clone(),
        });
        Ok(())
    }

    async fn open_direct_conversation(&self, member: &MemberId) -> Result<ConversationId> {
        let delay = self.open_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Self::dm(member.as_str()))
    }
}
