//! A leased connection held for the duration of a transaction.
//!
//! Grounded on `original_source/sql/transaction.go`'s `Transaction`: LQTP
//! has no multi-statement transaction log yet, so `commit`/`rollback` both
//! just release the leased connection back to the pool, matching the
//! source exactly (its own comment marks `Commit`'s body as a stub).

use std::sync::Arc;

use crate::conn::{Connection, ConnectionPool};

/// A connection leased out of a pool for the duration of a transaction.
pub struct Transaction {
    id: String,
    pool: Arc<ConnectionPool>,
    connection: Arc<Connection>,
}

impl Transaction {
    pub fn new(id: impl Into<String>, pool: Arc<ConnectionPool>, connection: Arc<Connection>) -> Self {
        Self {
            id: id.into(),
            pool,
            connection,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn commit(&self) {
        self.pool.put(&self.connection).await;
    }

    pub async fn rollback(&self) {
        self.pool.put(&self.connection).await;
    }
}
