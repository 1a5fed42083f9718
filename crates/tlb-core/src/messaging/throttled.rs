use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ConversationId, MemberId},
    messaging::{port::MessagingPort, types::Persona},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* two Web API calls.
    pub global_min_interval: Duration,
    /// Minimum spacing between posts to the same conversation.
    pub per_conversation_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        // Slack allows roughly one chat.postMessage per second per channel.
        Self {
            global_min_interval: Duration::from_millis(20),
            per_conversation_min_interval: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// MessagingPort decorator that rate-limits outbound calls.
///
/// Best-effort protection against Slack `ratelimited` responses when a batch
/// of notices lands on the same conversation.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_conversation: Mutex<HashMap<String, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_conversation: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for(&self, conversation: &ConversationId) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_conversation.lock().await;
        map.entry(conversation.0.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_conversation_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_conversation(&self, conversation: &ConversationId) {
        let global_wait = { self.global.lock().await.reserve() };
        let conversation_wait = {
            let lim = self.limiter_for(conversation).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(conversation_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    async fn throttle_global(&self) {
        let wait = { self.global.lock().await.reserve() };
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    async fn post(
        &self,
        destination: &ConversationId,
        text: &str,
        persona: &Persona,
    ) -> Result<()> {
        self.throttle_conversation(destination).await;
        self.inner.post(destination, text, persona).await
    }

    async fn open_direct_conversation(&self, member: &MemberId) -> Result<ConversationId> {
        // No conversation yet; apply global throttling only.
        self.throttle_global().await;
        self.inner.open_direct_conversation(member).await
    }
}
