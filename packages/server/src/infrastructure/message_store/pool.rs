//! Bounded pool of links to the message-store service
//!
//! - `acquire` pops an idle link without waiting, otherwise dials a new one
//!   under `dial_timeout`
//! - `release` returns a link to the idle slots, or closes it if they are full
//! - `shutdown` closes every idle link; links checked out at that moment are
//!   closed when they come back
//!
//! Every open link (idle or checked out) holds a semaphore permit, so at most
//! `max_open` links exist at once. A checked-out link is a [`PooledLink`]
//! moved into `release` by value, so it cannot be returned twice.

use std::{
    collections::VecDeque,
    ops::{Deref, DerefMut},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::link::{StoreRequest, StoreResponse};

/// Pool and link errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("failed to dial message store: {0}")]
    Dial(String),

    #[error("dialing message store timed out after {0:?}")]
    DialTimeout(Duration),

    #[error("connection pool is shut down")]
    Closed,

    #[error("message store link I/O error: {0}")]
    Io(String),
}

/// One open link to the message store
///
/// Dropping the link closes it.
#[async_trait]
pub trait StoreLink: Send + 'static {
    /// Send one request and wait for its response
    async fn call(&mut self, request: &StoreRequest) -> Result<StoreResponse, PoolError>;
}

/// Opens new links
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    type Link: StoreLink;

    async fn dial(&self) -> Result<Self::Link, PoolError>;
}

/// Pool sizing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_idle: usize,
    pub max_open: usize,
    pub dial_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: 5,
            max_open: 20,
            dial_timeout: Duration::from_secs(10),
        }
    }
}

/// A checked-out link
#[derive(Debug)]
pub struct PooledLink<L> {
    link: L,
    _permit: OwnedSemaphorePermit,
}

impl<L> Deref for PooledLink<L> {
    type Target = L;

    fn deref(&self) -> &Self::Target {
        &self.link
    }
}

impl<L> DerefMut for PooledLink<L> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.link
    }
}

pub struct ConnectionPool<D: Dialer> {
    dialer: D,
    config: PoolConfig,
    idle: Mutex<VecDeque<PooledLink<D::Link>>>,
    open: Arc<Semaphore>,
    closed: AtomicBool,
}

impl<D: Dialer> ConnectionPool<D> {
    pub fn new(dialer: D, config: PoolConfig) -> Self {
        Self {
            dialer,
            idle: Mutex::new(VecDeque::with_capacity(config.max_idle)),
            open: Arc::new(Semaphore::new(config.max_open)),
            closed: AtomicBool::new(false),
            config,
        }
    }

    fn idle(&self) -> MutexGuard<'_, VecDeque<PooledLink<D::Link>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check out a link
    pub async fn acquire(&self) -> Result<PooledLink<D::Link>, PoolError> {
        if self.is_shut_down() {
            return Err(PoolError::Closed);
        }
        if let Some(link) = self.idle().pop_front() {
            return Ok(link);
        }

        let dial_timeout = self.config.dial_timeout;
        let dial = async {
            let permit = self
                .open
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| PoolError::Closed)?;
            let link = self.dialer.dial().await?;
            Ok::<_, PoolError>(PooledLink {
                link,
                _permit: permit,
            })
        };
        match tokio::time::timeout(dial_timeout, dial).await {
            Ok(result) => {
                if result.is_ok() {
                    tracing::debug!(open = self.open_count(), "Dialed new message store link");
                }
                result
            }
            Err(_) => Err(PoolError::DialTimeout(dial_timeout)),
        }
    }

    /// Return a checked-out link
    pub fn release(&self, link: PooledLink<D::Link>) {
        let mut idle = self.idle();
        // `closed` only flips while the idle lock is held.
        if self.is_shut_down() {
            drop(idle);
            drop(link);
            return;
        }
        if idle.len() < self.config.max_idle {
            idle.push_back(link);
        } else {
            drop(idle);
            drop(link);
            tracing::debug!("Idle slots full, closed message store link");
        }
    }

    /// Close all idle links and refuse further checkouts
    pub fn shutdown(&self) {
        let drained: Vec<_> = {
            let mut idle = self.idle();
            self.closed.store(true, Ordering::SeqCst);
            idle.drain(..).collect()
        };
        self.open.close();
        tracing::info!(closed = drained.len(), "Connection pool shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn idle_count(&self) -> usize {
        self.idle().len()
    }

    /// Links currently open, idle or checked out
    pub fn open_count(&self) -> usize {
        self.config
            .max_open
            .saturating_sub(self.open.available_permits())
    }
}
