//! Connection pooling for the Redis backend.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};

use crate::error::{RedisError, RedisResult};
use crate::transport::Connection;

/// Backend connection settings.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub addr: String,
    pub max_connections: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:6379".to_string(),
            max_connections: 8,
        }
    }
}

impl RedisConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }

    pub fn max_connections(mut self, n: usize) -> Self {
        self.max_connections = n;
        self
    }
}

/// Bounded pool of lazily created connections.
pub struct RedisPool {
    config: RedisConfig,
    idle: Arc<Mutex<VecDeque<Connection>>>,
    permits: Arc<Semaphore>,
}

impl RedisPool {
    pub fn new(config: RedisConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_connections.max(1)));
        Self {
            config,
            idle: Arc::new(Mutex::new(VecDeque::new())),
            permits,
        }
    }

    /// Check out a connection, creating one if none is idle.
    pub async fn acquire(&self) -> RedisResult<PooledConnection> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| RedisError::PoolClosed)?;

        let existing = {
            let mut idle = self.idle.lock().await;
            idle.pop_front()
        };
        let conn = match existing {
            Some(conn) => conn,
            None => Connection::connect(&self.config.addr).await?,
        };

        Ok(PooledConnection {
            conn: Some(conn),
            idle: Arc::clone(&self.idle),
            _permit: permit,
        })
    }
}

/// A checked-out connection; returns to the pool on drop.
pub struct PooledConnection {
    conn: Option<Connection>,
    idle: Arc<Mutex<VecDeque<Connection>>>,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Drop the underlying connection instead of returning it, e.g. after
    /// an IO error left the stream in an unknown state.
    pub fn discard(mut self) {
        self.conn = None;
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            let idle = Arc::clone(&self.idle);
            tokio::spawn(async move {
                let mut idle = idle.lock().await;
                idle.push_back(conn);
            });
        }
    }
}
