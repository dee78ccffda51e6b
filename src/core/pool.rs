//! Bounded connection pool.
//!
//! The pool owns every idle transport and counts every open one. A transport
//! is either idle in the pool or leased to exactly one [`PooledConnection`];
//! the lease goes back to the pool when the guard drops, on every exit path,
//! including cancelled futures.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::core::builder::ClientConfig;
use crate::core::transport::{round_trip, Connector, Transport};
use crate::proto::frame::Frame;
use crate::{Error, Result};

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Open transports waiting in the pool.
    pub idle: usize,
    /// Open transports, idle or leased.
    pub open: usize,
    /// Configured capacity.
    pub max: usize,
}

impl PoolStatus {
    /// Transports currently leased to callers.
    pub fn leased(&self) -> usize {
        self.open - self.idle
    }
}

struct PoolState<T> {
    idle: VecDeque<T>,
    open: usize,
}

/// A bounded set of transports produced by one [`Connector`].
pub struct Pool<C: Connector> {
    connector: C,
    config: ClientConfig,
    state: Mutex<PoolState<C::Transport>>,
    available: Notify,
}

impl<C: Connector> Pool<C> {
    /// Creates an empty pool. No connection is opened until the first acquire.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `max_connections` is zero.
    pub fn new(connector: C, config: ClientConfig) -> Result<Self> {
        if config.max_connections == 0 {
            return Err(Error::InvalidArgument {
                message: "max_connections must be at least 1".to_string(),
            });
        }
        Ok(Self {
            connector,
            config,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                open: 0,
            }),
            available: Notify::new(),
        })
    }

    /// Returns the connector used to open new transports.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Returns the configuration shared with every transport.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns current occupancy.
    pub fn status(&self) -> PoolStatus {
        let state = self.state.lock();
        PoolStatus {
            idle: state.idle.len(),
            open: state.open,
            max: self.config.max_connections,
        }
    }

    /// Leases a transport, opening one if the pool is below capacity.
    ///
    /// The acquire timeout bounds only the wait for a released transport.
    /// Opening a new one is bounded by the connector's own timeouts.
    ///
    /// # Errors
    ///
    /// [`Error::PoolExhausted`] if every slot stayed leased for the whole
    /// acquire timeout, or the connector's error if opening failed.
    pub async fn acquire(&self) -> Result<PooledConnection<'_, C>> {
        let deadline = Instant::now() + self.config.acquire_timeout;
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before inspecting state so a release in between is not missed.
            notified.as_mut().enable();

            let reserved = {
                let mut state = self.state.lock();
                while let Some(transport) = state.idle.pop_front() {
                    if transport.is_healthy() {
                        return Ok(self.lease(transport));
                    }
                    state.open -= 1;
                    debug!("discarded unhealthy idle connection");
                }
                if state.open < self.config.max_connections {
                    state.open += 1;
                    true
                } else {
                    false
                }
            };

            if reserved {
                return self.open_reserved().await;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                debug!(max = self.config.max_connections, "acquire timed out");
                return Err(Error::PoolExhausted {
                    max: self.config.max_connections,
                });
            }
        }
    }

    async fn open_reserved(&self) -> Result<PooledConnection<'_, C>> {
        let slot = Reservation { pool: self };
        let transport = self.connector.open(&self.config).await?;
        std::mem::forget(slot);
        debug!(open = self.status().open, "opened new connection");
        Ok(self.lease(transport))
    }

    fn lease(&self, transport: C::Transport) -> PooledConnection<'_, C> {
        PooledConnection {
            pool: self,
            transport: Some(transport),
            in_flight: false,
        }
    }

    fn release(&self, transport: C::Transport, reusable: bool) {
        {
            let mut state = self.state.lock();
            if reusable && transport.is_healthy() {
                state.idle.push_back(transport);
            } else {
                state.open -= 1;
                warn!(open = state.open, "evicted broken connection");
                drop(transport);
            }
        }
        self.available.notify_one();
    }

    fn forget_slot(&self) {
        self.state.lock().open -= 1;
        self.available.notify_one();
    }

    /// Closes every idle transport. Leased transports are closed when released
    /// only if they are broken; call this after all work is done.
    pub async fn close_idle(&self) {
        let idle: Vec<_> = {
            let mut state = self.state.lock();
            let drained: Vec<_> = state.idle.drain(..).collect();
            state.open -= drained.len();
            drained
        };
        join_all(idle.into_iter().map(|mut transport| async move {
            if let Err(e) = transport.close().await {
                debug!(error = %e, "error while closing idle connection");
            }
        }))
        .await;
        self.available.notify_waiters();
    }
}

impl<C: Connector> fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("status", &self.status())
            .finish()
    }
}

/// Gives back an open slot if opening a transport fails or is cancelled.
struct Reservation<'a, C: Connector> {
    pool: &'a Pool<C>,
}

impl<C: Connector> Drop for Reservation<'_, C> {
    fn drop(&mut self) {
        self.pool.forget_slot();
    }
}

/// A transport leased from a [`Pool`]. Returns itself to the pool on drop.
pub struct PooledConnection<'a, C: Connector> {
    pool: &'a Pool<C>,
    transport: Option<C::Transport>,
    in_flight: bool,
}

impl<C: Connector> PooledConnection<'_, C> {
    /// Sends one encoded request and waits for its reply.
    ///
    /// If the future is dropped between the write and the reply, the
    /// transport is discarded on release: its framing position is unknown.
    pub async fn call(&mut self, payload: &[u8]) -> Result<Frame> {
        self.in_flight = true;
        let result = round_trip(&mut **self, payload).await;
        self.in_flight = false;
        result
    }
}

impl<C: Connector> Deref for PooledConnection<'_, C> {
    type Target = C::Transport;

    fn deref(&self) -> &Self::Target {
        match &self.transport {
            Some(transport) => transport,
            None => unreachable!("transport is only taken on drop"),
        }
    }
}

impl<C: Connector> DerefMut for PooledConnection<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.transport {
            Some(transport) => transport,
            None => unreachable!("transport is only taken on drop"),
        }
    }
}

impl<C: Connector> Drop for PooledConnection<'_, C> {
    fn drop(&mut self) {
        if let Some(transport) = self.transport.take() {
            self.pool.release(transport, !self.in_flight);
        }
    }
}

impl<C: Connector> fmt::Debug for PooledConnection<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("healthy", &self.is_healthy())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}
