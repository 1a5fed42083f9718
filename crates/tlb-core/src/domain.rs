use std::fmt;

/// Chat-platform member id (e.g. Slack `U0123ABCD`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(pub String);

/// Conversation/channel id a message can be posted to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConversationId(pub String);

/// Opaque id of a persisted pair record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordId(pub i64);

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Two members twinned together.
///
/// The relationship is unordered; `user1`/`user2` only record the order the
/// admin typed them in.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Pair {
    pub user1: MemberId,
    pub user2: MemberId,
}

impl Pair {
    pub fn new(user1: MemberId, user2: MemberId) -> Self {
        Self { user1, user2 }
    }

    pub fn contains(&self, member: &MemberId) -> bool {
        &self.user1 == member || &self.user2 == member
    }

    /// Same pair with the smaller id first, for order-insensitive comparisons.
    pub fn normalized(&self) -> Self {
        if self.user1 <= self.user2 {
            self.clone()
        } else {
            Self::new(self.user2.clone(), self.user1.clone())
        }
    }
}
