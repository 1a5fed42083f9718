//! Durable store port for twin pairs.
//!
//! One record per pair (not per member), all records scoped to a single
//! list. Destructive operations must run inside one store transaction; the
//! registry only updates its map after the call returns `Ok`.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;

use crate::{
    domain::{MemberId, Pair, RecordId},
    errors::Error,
    Result,
};

#[async_trait]
pub trait PairStore: Send + Sync {
    /// Every pair of the list, used once at startup to rebuild the registry.
    async fn load_all(&self) -> Result<Vec<Pair>>;

    async fn insert(&self, pair: &Pair) -> Result<RecordId>;

    /// Delete the record referencing `member` on either side.
    ///
    /// Returns `Error::NotFound` when no record references the member.
    async fn delete_by_member(&self, member: &MemberId) -> Result<()>;

    /// Delete every record of the list, returning how many were removed.
    async fn delete_all(&self) -> Result<u64>;
}

/// In-process store used by tests and the `STORE=memory` dev mode.
///
/// Nothing survives a restart of the process, but a clone of the `Arc` can be
/// handed to a second registry to simulate one.
#[derive(Default)]
pub struct MemoryPairStore {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
}

#[derive(Default)]
struct MemoryState {
    next_id: i64,
    records: Vec<(RecordId, Pair)>,
}

impl MemoryPairStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the backend were unreachable.
    #[cfg(test)]
    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Records actually held, even while calls are made to fail.
    #[cfg(test)]
    pub(crate) fn record_count(&self) -> usize {
        self.state
            .lock()
            .map(|st| st.records.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().records.len())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Persistence("memory store unavailable".to_string()));
        }
        self.state
            .lock()
            .map_err(|_| Error::Persistence("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl PairStore for MemoryPairStore {
    async fn load_all(&self) -> Result<Vec<Pair>> {
        let st = self.lock()?;
        Ok(st.records.iter().map(|(_, p)| p.clone()).collect())
    }

    async fn insert(&self, pair: &Pair) -> Result<RecordId> {
        let mut st = self.lock()?;
        st.next_id += 1;
        let id = RecordId(st.next_id);
        st.records.push((id, pair.clone()));
        Ok(id)
    }

    async fn delete_by_member(&self, member: &MemberId) -> Result<()> {
        let mut st = self.lock()?;
        let Some(idx) = st.records.iter().position(|(_, p)| p.contains(member)) else {
            return Err(Error::NotFound(format!("no twin lunch record for {member}")));
        };
        st.records.remove(idx);
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut st = self.lock()?;
        let n = st.records.len() as u64;
        st.records.clear();
        Ok(n)
    }
}
