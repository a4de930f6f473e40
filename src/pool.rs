//! Bounded worker pool.
//!
//! A [`WorkerPool`] hands out permits; holding one is what allows a
//! password test to run. Sub-pools carve a smaller budget out of a parent:
//! a sub-pool permit holds one slot of every pool up to the root, so the
//! root capacity bounds every test in the process no matter how the
//! budget was split.
//!
//! Deadlock freedom relies on one rule: only leaf work holds permits.
//! Consumers create sub-pools without holding a permit of their own, and
//! permits are always taken child first, then parent.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

struct PoolInner {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    parent: Option<WorkerPool>,
}

/// Cloneable handle to a pool; clones share the same permits.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

/// Permission to run one unit of work. Dropping it releases every slot.
#[must_use = "dropping the permit releases it immediately"]
pub struct PoolPermit {
    // child first, root last
    _held: Vec<OwnedSemaphorePermit>,
}

impl PoolPermit {
    /// Give the slot back. Equivalent to dropping the permit.
    pub fn release(self) {}
}

impl WorkerPool {
    /// Create a root pool. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self::with_parent(capacity, None)
    }

    fn with_parent(capacity: usize, parent: Option<WorkerPool>) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                parent,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Permits not currently handed out by this pool.
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    /// Carve out a child pool, clamped to `1..=self.capacity()`.
    pub fn sub_pool(&self, capacity: usize) -> WorkerPool {
        Self::with_parent(capacity.min(self.capacity()), Some(self.clone()))
    }

    /// Wait for a permit from this pool and every ancestor.
    ///
    /// Returns `None` as soon as `token` is cancelled; slots acquired so
    /// far are released on the way out.
    pub async fn acquire(&self, token: &CancellationToken) -> Option<PoolPermit> {
        let mut held = Vec::new();
        let mut pool = Some(self);

        while let Some(current) = pool {
            let semaphore = Arc::clone(&current.inner.semaphore);
            let permit = tokio::select! {
                biased;
                _ = token.cancelled() => return None,
                permit = semaphore.acquire_owned() => permit.ok()?,
            };
            held.push(permit);
            pool = current.inner.parent.as_ref();
        }

        Some(PoolPermit { _held: held })
    }
}

/// Per-archive parallelism for a consumer about to start an archive.
///
/// `active` counts the archives already running. The share shrinks as
/// more archives run side by side and never drops below one.
pub fn sub_pool_capacity(pool_capacity: usize, active: usize) -> usize {
    (pool_capacity.saturating_sub(active) / active.max(1)).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn sub_pool_share_shrinks_but_never_reaches_zero() {
        assert_eq!(sub_pool_capacity(4, 0), 4);
        assert_eq!(sub_pool_capacity(4, 1), 3);
        assert_eq!(sub_pool_capacity(4, 2), 1);
        assert_eq!(sub_pool_capacity(4, 3), 1);
        assert_eq!(sub_pool_capacity(4, 50), 1);
        assert_eq!(sub_pool_capacity(16, 3), 4);
        assert_eq!(sub_pool_capacity(0, 0), 1);
    }

    #[test]
    fn capacities_are_clamped() {
        let root = WorkerPool::new(0);
        assert_eq!(root.capacity(), 1);

        let root = WorkerPool::new(4);
        assert_eq!(root.sub_pool(10).capacity(), 4);
        assert_eq!(root.sub_pool(0).capacity(), 1);
    }

    #[tokio::test]
    async fn sub_pool_permit_holds_root_slot() {
        let token = CancellationToken::new();
        let root = WorkerPool::new(2);
        let child = root.sub_pool(2);

        let a = child.acquire(&token).await.unwrap();
        assert_eq!(root.available(), 1);
        assert_eq!(child.available(), 1);

        a.release();
        assert_eq!(root.available(), 2);
        assert_eq!(child.available(), 2);
    }

    #[tokio::test]
    async fn cancellation_unblocks_waiters() {
        let token = CancellationToken::new();
        let pool = WorkerPool::new(1);
        let _held = pool.acquire(&token).await.unwrap();

        let waiter = {
            let pool = pool.clone();
            let token = token.clone();
            tokio::spawn(async move { pool.acquire(&token).await.is_none() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn nested_sub_pools_respect_root_capacity() {
        let token = CancellationToken::new();
        let root = WorkerPool::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let sub = root.sub_pool(3);
            for _ in 0..8 {
                let sub = sub.clone();
                let token = token.clone();
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                tasks.push(tokio::spawn(async move {
                    let _permit = sub.acquire(&token).await.unwrap();
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                }));
            }
        }
        for t in tasks {
            t.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(root.available(), 3);
    }
}
