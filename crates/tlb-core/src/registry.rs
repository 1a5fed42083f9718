//! In-memory pairing registry backed by a durable [`PairStore`].
//!
//! The map is bidirectional: for every `a -> b` entry there is a `b -> a`
//! entry. Mutations write to the store first and only touch the map once the
//! store call succeeded, so a persistence failure never leaves a half-applied
//! pair behind.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tracing::{info, warn};

use crate::{
    domain::{MemberId, Pair},
    errors::Error,
    store::PairStore,
    Result,
};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("a member cannot be twinned with themselves")]
    SameUser,

    #[error("{0} already has a twin")]
    AlreadyPaired(MemberId),

    #[error("{0} and {1} are not twinned together")]
    NotPaired(MemberId, MemberId),

    #[error(transparent)]
    Persistence(#[from] Error),
}

pub struct PairingRegistry {
    store: Arc<dyn PairStore>,
    partners: HashMap<MemberId, MemberId>,
}

impl PairingRegistry {
    /// Empty registry; nothing is read from `store`.
    pub fn new(store: Arc<dyn PairStore>) -> Self {
        Self {
            store,
            partners: HashMap::new(),
        }
    }

    /// Rebuild the registry from every persisted pair.
    ///
    /// Records that would break the registry invariants (self-pairs, a member
    /// appearing in two records) are skipped with a warning.
    pub async fn load(store: Arc<dyn PairStore>) -> Result<Self> {
        let pairs = store.load_all().await?;
        let mut registry = Self::new(store);

        let mut skipped = 0usize;
        for pair in pairs {
            if pair.user1 == pair.user2
                || registry.partners.contains_key(&pair.user1)
                || registry.partners.contains_key(&pair.user2)
            {
                warn!(user1 = %pair.user1, user2 = %pair.user2, "skipping inconsistent twin lunch record");
                skipped += 1;
                continue;
            }
            registry.insert_both(pair.user1, pair.user2);
        }

        info!(pairs = registry.len(), skipped, "loaded twin lunches");
        Ok(registry)
    }

    pub fn lookup(&self, member: &MemberId) -> Option<&MemberId> {
        self.partners.get(member)
    }

    /// Number of active pairs.
    pub fn len(&self) -> usize {
        self.partners.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }

    pub async fn create(
        &mut self,
        user1: &MemberId,
        user2: &MemberId,
    ) -> std::result::Result<(), RegistryError> {
        if user1 == user2 {
            return Err(RegistryError::SameUser);
        }
        for member in [user1, user2] {
            if self.partners.contains_key(member) {
                return Err(RegistryError::AlreadyPaired(member.clone()));
            }
        }

        let pair = Pair::new(user1.clone(), user2.clone());
        let record = self.store.insert(&pair).await?;

        self.insert_both(pair.user1, pair.user2);
        info!(user1 = %user1, user2 = %user2, record = record.0, "created twin lunch");
        Ok(())
    }

    pub async fn remove(
        &mut self,
        user1: &MemberId,
        user2: &MemberId,
    ) -> std::result::Result<(), RegistryError> {
        if self.partners.get(user1) != Some(user2) {
            return Err(RegistryError::NotPaired(user1.clone(), user2.clone()));
        }

        self.store.delete_by_member(user1).await?;

        self.partners.remove(user1);
        self.partners.remove(user2);
        info!(user1 = %user1, user2 = %user2, "removed twin lunch");
        Ok(())
    }

    pub async fn clear(&mut self) -> std::result::Result<(), RegistryError> {
        let deleted = self.store.delete_all().await?;

        self.partners.clear();
        info!(deleted, "cleared twin lunches");
        Ok(())
    }

    /// One entry per pair, smaller member id first, sorted.
    pub fn list(&self) -> Vec<Pair> {
        let mut members: Vec<&MemberId> = self.partners.keys().collect();
        members.sort();

        let mut listed: HashSet<&MemberId> = HashSet::with_capacity(self.partners.len());
        let mut out = Vec::with_capacity(self.len());
        for member in members {
            if listed.contains(member) {
                continue;
            }
            let Some(partner) = self.partners.get(member) else {
                continue;
            };
            listed.insert(member);
            listed.insert(partner);
            out.push(Pair::new(member.clone(), partner.clone()));
        }
        out
    }

    fn insert_both(&mut self, user1: MemberId, user2: MemberId) {
        self.partners.insert(user1.clone(), user2.clone());
        self.partners.insert(user2, user1);
    }
}
