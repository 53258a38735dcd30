//! A small pool of multiplexed connections, each leased out concurrently
//! up to a fixed admission count.
//!
//! Grounded on `original_source/sql/connection_pool.go`: connections are
//! created lazily up to `max_connections`, and each one tracks up to 50
//! concurrent leases via a semaphore rather than being limited to one
//! caller at a time (a single LQTP connection already multiplexes many
//! in-flight requests). `Get` retries with a short sleep when every
//! existing connection is fully leased and the pool is at capacity,
//! matching the source's 10-try / 1ms-sleep loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};

use crate::conn::connection::Connection;
use crate::conn::params::ConnectParams;
use crate::error::{LbError, LbResult};

/// Leases per connection before the pool opens another physical
/// connection to carry the overflow.
const LEASES_PER_CONNECTION: usize = 50;
const GET_RETRIES: u32 = 10;
const GET_RETRY_DELAY: Duration = Duration::from_millis(1);

struct PoolItem {
    connection: Arc<Connection>,
    admission: Arc<Semaphore>,
}

/// A bounded pool of [`Connection`]s opened against a single
/// [`ConnectParams`] target.
pub struct ConnectionPool {
    params: ConnectParams,
    max_connections: usize,
    items: Mutex<Vec<PoolItem>>,
}

impl ConnectionPool {
    pub fn new(params: ConnectParams, max_connections: usize) -> Self {
        Self {
            params,
            max_connections,
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn params(&self) -> &ConnectParams {
        &self.params
    }

    /// Returns a connection with a lease already acquired. Blocks (with a
    /// bounded retry budget) if every open connection is fully leased and
    /// the pool is already at `max_connections`.
    pub async fn get(&self) -> LbResult<Arc<Connection>> {
        for attempt in 0..=GET_RETRIES {
            let mut items = self.items.lock().await;

            for item in items.iter() {
                if let Ok(permit) = item.admission.try_acquire() {
                    permit.forget();
                    return Ok(Arc::clone(&item.connection));
                }
            }

            if items.len() < self.max_connections {
                let connection = Arc::new(Connection::connect(self.params.clone()).await?);
                let admission = Arc::new(Semaphore::new(LEASES_PER_CONNECTION));
                admission
                    .try_acquire()
                    .expect("freshly created semaphore always has permits")
                    .forget();
                items.push(PoolItem {
                    connection: Arc::clone(&connection),
                    admission,
                });
                return Ok(connection);
            }

            drop(items);

            if attempt < GET_RETRIES {
                tokio::time::sleep(GET_RETRY_DELAY).await;
            }
        }

        Err(LbError::PoolExhausted)
    }

    /// Releases a lease acquired by [`ConnectionPool::get`].
    pub async fn put(&self, connection: &Arc<Connection>) {
        let items = self.items.lock().await;
        for item in items.iter() {
            if Arc::ptr_eq(&item.connection, connection) {
                item.admission.add_permits(1);
                return;
            }
        }
    }

    /// Removes and closes a connection, e.g. after it became fatally
    /// broken.
    pub async fn remove(&self, connection: &Arc<Connection>) {
        let mut items = self.items.lock().await;
        if let Some(pos) = items.iter().position(|i| Arc::ptr_eq(&i.connection, connection)) {
            let item = items.remove(pos);
            item.connection.close().await;
        }
    }

    /// Closes every open connection and empties the pool.
    pub async fn close(&self) {
        let mut items = self.items.lock().await;
        for item in items.drain(..) {
            item.connection.close().await;
        }
    }
}
