//! Pool of reusable oracle sessions.
//!
//! Sessions are expensive to create, so idle ones are kept for the next
//! borrower. The pool has no size limit: it grows to the peak number of
//! concurrent borrowers.
//!
//! There is no guard type that returns a session on drop. A borrower calls
//! [`OraclePool::release`] explicitly after a successful use; a session whose
//! use failed is dropped by the borrower and never comes back, since its
//! state can no longer be trusted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::error::OracleError;

use super::OracleSession;

/// Creates new oracle sessions for a pool.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: OracleSession;

    async fn create(&self) -> Result<Self::Session, OracleError>;
}

pub struct OraclePool<F: SessionFactory> {
    factory: F,
    idle: Mutex<Vec<F::Session>>,
    created: AtomicUsize,
}

impl<F: SessionFactory> OraclePool<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            idle: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
        }
    }

    /// Take an idle session, or create one when none is idle.
    ///
    /// The idle-set lock is held only for the pop; session creation happens
    /// outside it.
    pub async fn borrow(&self) -> Result<F::Session, OracleError> {
        let reused = self.lock_idle().pop();
        if let Some(session) = reused {
            debug!("reusing idle oracle session");
            return Ok(session);
        }

        let session = self.factory.create().await?;
        let total = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(created = total, "created oracle session");
        Ok(session)
    }

    /// Return a session after a successful use.
    pub fn release(&self, session: F::Session) {
        self.lock_idle().push(session);
    }

    /// Number of sessions created over the pool's lifetime.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Number of sessions currently idle.
    pub fn idle(&self) -> usize {
        self.lock_idle().len()
    }

    fn lock_idle(&self) -> std::sync::MutexGuard<'_, Vec<F::Session>> {
        // A panic while holding the lock leaves the Vec intact.
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
