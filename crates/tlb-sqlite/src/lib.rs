//! SQLite durable store for twin pairs (sqlx).
//!
//! Pairs live in one table, scoped by a list key so several twin-lunch lists
//! can share a database. Destructive operations run inside one transaction.

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow},
    Row,
};
use tracing::{debug, info};

use tlb_core::{
    domain::{MemberId, Pair, RecordId},
    errors::Error,
    store::PairStore,
    Result,
};

pub struct SqlitePairStore {
    pool: SqlitePool,
    list_key: String,
}

fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> Error {
    move |e| Error::Persistence(format!("{context}: {e}"))
}

fn pair_from_row(row: &SqliteRow) -> Result<(RecordId, Pair)> {
    let id: i64 = row.try_get("id").map_err(db_err("error reading twin lunch"))?;
    let user1: String = row
        .try_get("user1")
        .map_err(db_err("error reading twin lunch"))?;
    let user2: String = row
        .try_get("user2")
        .map_err(db_err("error reading twin lunch"))?;
    Ok((
        RecordId(id),
        Pair::new(MemberId::new(user1), MemberId::new(user2)),
    ))
}

impl SqlitePairStore {
    /// Open a pool on `database_url` and create the schema if needed.
    pub async fn connect(database_url: &str, list_key: impl Into<String>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(db_err("failed to connect to SQLite"))?;

        Self::init(&pool).await?;
        let list_key = list_key.into();
        info!(list = %list_key, "connected to twin lunch store");
        Ok(Self::with_pool(pool, list_key))
    }

    /// Use an existing pool; [`SqlitePairStore::init`] must have run on it.
    pub fn with_pool(pool: SqlitePool, list_key: impl Into<String>) -> Self {
        Self {
            pool,
            list_key: list_key.into(),
        }
    }

    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS twin_lunches (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                list_key   TEXT    NOT NULL,
                user1      TEXT    NOT NULL,
                user2      TEXT    NOT NULL,
                created_at INTEGER NOT NULL
            )"#,
        )
        .execute(pool)
        .await
        .map_err(db_err("failed to create twin_lunches table"))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS twin_lunches_list_key ON twin_lunches (list_key)")
            .execute(pool)
            .await
            .map_err(db_err("failed to create twin_lunches index"))?;
        Ok(())
    }
}

#[async_trait]
impl PairStore for SqlitePairStore {
    async fn load_all(&self) -> Result<Vec<Pair>> {
        let rows = sqlx::query("SELECT id, user1, user2 FROM twin_lunches WHERE list_key = ? ORDER BY id")
            .bind(&self.list_key)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("error reading twin lunches"))?;

        rows.iter()
            .map(|row| pair_from_row(row).map(|(_, pair)| pair))
            .collect()
    }

    async fn insert(&self, pair: &Pair) -> Result<RecordId> {
        let result = sqlx::query(
            "INSERT INTO twin_lunches (list_key, user1, user2, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&self.list_key)
        .bind(pair.user1.as_str())
        .bind(pair.user2.as_str())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(db_err("error writing twin lunch"))?;

        Ok(RecordId(result.last_insert_rowid()))
    }

    async fn delete_by_member(&self, member: &MemberId) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("error starting transaction"))?;

        let rows = sqlx::query("SELECT id, user1, user2 FROM twin_lunches WHERE list_key = ? ORDER BY id")
            .bind(&self.list_key)
            .fetch_all(&mut *tx)
            .await
            .map_err(db_err("error listing twin lunches"))?;

        let mut found = None;
        for row in &rows {
            let (id, pair) = pair_from_row(row)?;
            if pair.contains(member) {
                found = Some(id);
                break;
            }
        }
        let Some(id) = found else {
            // Dropping `tx` rolls back.
            return Err(Error::NotFound(format!(
                "could not find twin lunch for {member} in store"
            )));
        };

        sqlx::query("DELETE FROM twin_lunches WHERE id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await
            .map_err(db_err("error deleting twin lunch"))?;

        tx.commit()
            .await
            .map_err(db_err("error committing transaction"))?;
        debug!(record = id.0, member = %member, "deleted twin lunch record");
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("error starting transaction"))?;

        let result = sqlx::query("DELETE FROM twin_lunches WHERE list_key = ?")
            .bind(&self.list_key)
            .execute(&mut *tx)
            .await
            .map_err(db_err("error deleting twin lunches"))?;

        tx.commit()
            .await
            .map_err(db_err("error committing transaction"))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use super::*;
    use tlb_core::registry::PairingRegistry;

    async fn test_pool() -> SqlitePool {
        // One connection: every connection to `sqlite::memory:` is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqlitePairStore::init(&pool).await.unwrap();
        pool
    }

    fn pair(a: &str, b: &str) -> Pair {
        Pair::new(MemberId::new(a), MemberId::new(b))
    }

    #[tokio::test]
    async fn insert_and_load() {
        let store = SqlitePairStore::with_pool(test_pool().await, "default");
        let first = store.insert(&pair("U1", "U2")).await.unwrap();
        let second = store.insert(&pair("U3", "U4")).await.unwrap();
        assert_ne!(first, second);

        assert_eq!(
            store.load_all().await.unwrap(),
            vec![pair("U1", "U2"), pair("U3", "U4")]
        );
    }

    #[tokio::test]
    async fn delete_by_member_finds_either_side() {
        let store = SqlitePairStore::with_pool(test_pool().await, "default");
        store.insert(&pair("U1", "U2")).await.unwrap();
        store.insert(&pair("U3", "U4")).await.unwrap();

        store.delete_by_member(&MemberId::new("U2")).await.unwrap();
        assert_eq!(store.load_all().await.unwrap(), vec![pair("U3", "U4")]);

        let err = store
            .delete_by_member(&MemberId::new("U1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lists_are_isolated() {
        let pool = test_pool().await;
        let a = SqlitePairStore::with_pool(pool.clone(), "paris");
        let b = SqlitePairStore::with_pool(pool, "lyon");
        a.insert(&pair("U1", "U2")).await.unwrap();
        b.insert(&pair("U1", "U3")).await.unwrap();

        assert_eq!(a.delete_all().await.unwrap(), 1);
        assert!(a.load_all().await.unwrap().is_empty());
        assert_eq!(b.load_all().await.unwrap(), vec![pair("U1", "U3")]);

        assert!(matches!(
            a.delete_by_member(&MemberId::new("U3")).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn registry_survives_restart() {
        let pool = test_pool().await;
        let store = Arc::new(SqlitePairStore::with_pool(pool.clone(), "default"));

        let mut live = PairingRegistry::new(store.clone());
        let m = |id: &str| MemberId::new(id);
        live.create(&m("U1"), &m("U2")).await.unwrap();
        live.create(&m("U3"), &m("U4")).await.unwrap();
        live.create(&m("U5"), &m("U6")).await.unwrap();
        live.remove(&m("U3"), &m("U4")).await.unwrap();
        live.create(&m("U4"), &m("U1")).await.unwrap_err();
        live.create(&m("U4"), &m("U3")).await.unwrap();

        let restarted = PairingRegistry::load(Arc::new(SqlitePairStore::with_pool(pool, "default")))
            .await
            .unwrap();

        let as_set = |r: &PairingRegistry| -> HashSet<Pair> {
            r.list().iter().map(Pair::normalized).collect()
        };
        assert_eq!(as_set(&restarted), as_set(&live));
        assert_eq!(restarted.len(), 3);

        live.clear().await.unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }
}
