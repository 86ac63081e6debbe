//! Registry of running batches, for out-of-band cancellation.
//!
//! A service layer registers each batch when it starts and keeps the returned
//! [`Registration`] alive for as long as the batch runs. Dropping it removes
//! the entry, so the registry never outlives the work it tracks.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(pub u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Inner {
    next_id: AtomicU64,
    active: Mutex<HashMap<BatchId, CancellationToken>>,
}

#[derive(Debug, Clone, Default)]
pub struct CancelRegistry {
    inner: Arc<Inner>,
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new batch. Its token is a child of `parent` when one is given.
    pub fn register(&self, parent: Option<&CancellationToken>) -> Registration {
        let id = BatchId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let token = parent.map_or_else(CancellationToken::new, CancellationToken::child_token);
        self.active().insert(id, token.clone());
        tracing::debug!(batch_id = %id, "batch registered");
        Registration {
            id,
            token,
            registry: self.clone(),
        }
    }

    /// Cancels one batch. Returns false if it is not (or no longer) registered.
    pub fn cancel(&self, id: BatchId) -> bool {
        match self.active().get(&id) {
            Some(token) => {
                token.cancel();
                tracing::info!(batch_id = %id, "batch cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancels every running batch and returns how many there were.
    pub fn cancel_all(&self) -> usize {
        let active = self.active();
        for token in active.values() {
            token.cancel();
        }
        if !active.is_empty() {
            tracing::info!(count = active.len(), "cancelled all batches");
        }
        active.len()
    }

    pub fn len(&self) -> usize {
        self.active().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn active(&self) -> MutexGuard<'_, HashMap<BatchId, CancellationToken>> {
        // The map stays consistent even if a holder panicked.
        self.inner
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A registered batch. Dropping it unregisters the batch.
#[derive(Debug)]
pub struct Registration {
    id: BatchId,
    token: CancellationToken,
    registry: CancelRegistry,
}

impl Registration {
    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Token to hand to the batch controller.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.active().remove(&self.id);
        tracing::debug!(batch_id = %self.id, "batch unregistered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_drop() {
        let registry = CancelRegistry::new();
        let a = registry.register(None);
        let b = registry.register(None);
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.len(), 2);

        drop(a);
        assert_eq!(registry.len(), 1);
        drop(b);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_cancel_one() {
        let registry = CancelRegistry::new();
        let a = registry.register(None);
        let b = registry.register(None);

        assert!(registry.cancel(a.id()));
        assert!(a.token().is_cancelled());
        assert!(!b.token().is_cancelled());

        let stale = a.id();
        drop(a);
        assert!(!registry.cancel(stale));
    }

    #[test]
    fn test_cancel_all() {
        let registry = CancelRegistry::new();
        let regs: Vec<_> = (0..3).map(|_| registry.register(None)).collect();
        assert_eq!(registry.cancel_all(), 3);
        assert!(regs.iter().all(|r| r.token().is_cancelled()));
        drop(regs);
        assert_eq!(registry.cancel_all(), 0);
    }

    #[test]
    fn test_parent_token_propagates() {
        let registry = CancelRegistry::new();
        let parent = CancellationToken::new();
        let reg = registry.register(Some(&parent));
        parent.cancel();
        assert!(reg.token().is_cancelled());
    }
}
