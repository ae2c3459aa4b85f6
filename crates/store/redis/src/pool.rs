//! Connection pool with generation-based invalidation.
//!
//! A single coordinator task owns the idle set. [`Pool::get`] and
//! [`Pool::put`] talk to it over channels, and [`Pool::set_connection`]
//! publishes the new target on a `watch` channel. Every connection carries
//! the generation of the endpoint it was dialed against; once the target
//! changes, idle connections of the old generation are dropped and stale
//! connections handed back through `put` are closed instead of recycled.
//!
//! Borrowed connections are never waited on. They discard themselves when
//! returned.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

/// How the backend is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    Unix,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Unix => "unix",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target of a pool: a transport and an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub transport: Transport,
    pub address: String,
}

impl Endpoint {
    pub fn new(transport: Transport, address: impl Into<String>) -> Self {
        Self {
            transport,
            address: address.into(),
        }
    }

    pub fn tcp(address: impl Into<String>) -> Self {
        Self::new(Transport::Tcp, address)
    }

    /// Generation tag of connections dialed against this endpoint.
    pub fn generation(&self) -> String {
        format!("{}{}", self.transport, self.address)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.transport, self.address)
    }
}

/// Errors raised while obtaining a connection.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("pool coordinator is gone")]
    Closed,
}

/// Dials new connections for a [`Pool`].
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Connection: Send + 'static;

    async fn connect(&self, endpoint: &Endpoint) -> Result<Self::Connection, PoolError>;
}

/// A connection tagged with the generation it was dialed against.
#[derive(Debug)]
pub struct PooledConnection<T> {
    conn: T,
    generation: String,
}

impl<T> PooledConnection<T> {
    pub fn generation(&self) -> &str {
        &self.generation
    }
}

impl<T> Deref for PooledConnection<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.conn
    }
}

impl<T> DerefMut for PooledConnection<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.conn
    }
}

type Checkout<T> = oneshot::Sender<Option<PooledConnection<T>>>;

/// Pool of reusable connections to a single, reconfigurable endpoint.
///
/// Must be created inside a Tokio runtime: construction spawns the
/// coordinator task, which exits once the pool is dropped.
pub struct Pool<C: Connector> {
    connector: Arc<C>,
    target: watch::Sender<Endpoint>,
    checkout: mpsc::Sender<Checkout<C::Connection>>,
    checkin: Option<mpsc::Sender<PooledConnection<C::Connection>>>,
    connect_timeout: Duration,
}

impl<C: Connector> Pool<C> {
    /// Create a pool that keeps at most `capacity` idle connections. A
    /// capacity of zero disables reuse: every `get` dials and every `put`
    /// closes.
    pub fn new(connector: C, endpoint: Endpoint, capacity: usize, connect_timeout: Duration) -> Self {
        let (target, target_rx) = watch::channel(endpoint);
        let (checkout, checkout_rx) = mpsc::channel(64);
        let checkin = if capacity == 0 {
            None
        } else {
            let (checkin, checkin_rx) = mpsc::channel(capacity);
            tokio::spawn(coordinate(capacity, target_rx, checkout_rx, checkin_rx));
            Some(checkin)
        };

        Self {
            connector: Arc::new(connector),
            target,
            checkout,
            checkin,
            connect_timeout,
        }
    }

    /// The endpoint new connections are dialed against.
    pub fn endpoint(&self) -> Endpoint {
        self.target.borrow().clone()
    }

    /// Borrow an idle connection if one is available, otherwise dial the
    /// current endpoint.
    pub async fn get(&self) -> Result<PooledConnection<C::Connection>, PoolError> {
        if self.checkin.is_some() {
            let (reply, idle) = oneshot::channel();
            self.checkout
                .send(reply)
                .await
                .map_err(|_| PoolError::Closed)?;
            if let Some(conn) = idle.await.map_err(|_| PoolError::Closed)? {
                debug!(generation = %conn.generation, "reusing idle connection");
                return Ok(conn);
            }
        }

        let endpoint = self.endpoint();
        let conn = tokio::time::timeout(self.connect_timeout, self.connector.connect(&endpoint))
            .await
            .map_err(|_| PoolError::Timeout(self.connect_timeout))??;
        debug!(%endpoint, "dialed new connection");
        Ok(PooledConnection {
            conn,
            generation: endpoint.generation(),
        })
    }

    /// Hand a connection back for reuse without waiting.
    ///
    /// Returns `false` if the connection was closed instead: its generation
    /// is stale, the idle set is full or reuse is disabled. Connections that
    /// saw an error should be dropped rather than returned.
    pub fn put(&self, conn: PooledConnection<C::Connection>) -> bool {
        let Some(checkin) = &self.checkin else {
            return false;
        };
        if conn.generation != self.target.borrow().generation() {
            debug!(generation = %conn.generation, "closing stale connection");
            return false;
        }
        checkin.try_send(conn).is_ok()
    }

    /// Point the pool at a new endpoint.
    ///
    /// Idle connections to the old endpoint are drained by the coordinator.
    /// Returns `false` if the endpoint is unchanged.
    pub fn set_connection(&self, endpoint: Endpoint) -> bool {
        self.target.send_if_modified(|current| {
            if *current == endpoint {
                return false;
            }
            info!(from = %current, to = %endpoint, "pool endpoint changed");
            *current = endpoint;
            true
        })
    }
}

/// Sole owner of the idle set.
async fn coordinate<T: Send + 'static>(
    capacity: usize,
    mut target: watch::Receiver<Endpoint>,
    mut checkout: mpsc::Receiver<Checkout<T>>,
    mut checkin: mpsc::Receiver<PooledConnection<T>>,
) {
    let mut idle: VecDeque<PooledConnection<T>> = VecDeque::with_capacity(capacity);
    let mut generation = target.borrow_and_update().generation();

    loop {
        tokio::select! {
            biased;

            changed = target.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = target.borrow_and_update().generation();
                if next != generation {
                    generation = next;
                    let before = idle.len();
                    idle.retain(|conn| conn.generation == generation);
                    debug!(flushed = before - idle.len(), %generation, "flushed idle connections");
                }
            }
            Some(conn) = checkin.recv() => {
                if conn.generation != generation {
                    debug!(generation = %conn.generation, "discarding stale connection");
                } else if idle.len() >= capacity {
                    debug!("idle set full, closing connection");
                } else {
                    idle.push_back(conn);
                }
            }
            Some(reply) = checkout.recv() => {
                // The borrower may have given up; the connection then goes
                // back to the front of the queue.
                if let Err(Some(conn)) = reply.send(idle.pop_front()) {
                    idle.push_front(conn);
                }
            }
            else => break,
        }
    }
    debug!("pool coordinator stopped");
}

/// Dials multiplexed Redis connections.
#[derive(Debug, Default, Clone, Copy)]
pub struct RedisConnector;

impl RedisConnector {
    fn url(endpoint: &Endpoint) -> String {
        if endpoint.address.contains("://") {
            return endpoint.address.clone();
        }
        match endpoint.transport {
            Transport::Tcp => format!("redis://{}", endpoint.address),
            Transport::Unix => format!("redis+unix://{}", endpoint.address),
        }
    }
}

#[async_trait]
impl Connector for RedisConnector {
    type Connection = redis::aio::MultiplexedConnection;

    async fn connect(&self, endpoint: &Endpoint) -> Result<Self::Connection, PoolError> {
        let client = redis::Client::open(Self::url(endpoint).as_str())
            .map_err(|e| PoolError::Connect(e.to_string()))?;
        client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| PoolError::Connect(e.to_string()))
    }
}
