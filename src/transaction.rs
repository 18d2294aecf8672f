//! Unit of work for transaction-aware caches.
//!
//! A [`CacheTransaction`] becomes the ambient transaction for everything
//! awaited inside [`CacheTransaction::scope`]. While it is active, writes
//! (`put`, `evict`, `clear`) to caches whose policy is transaction-aware are
//! queued instead of executed. [`CacheTransaction::commit`] applies the queue
//! in order, [`CacheTransaction::rollback`] discards it. Reads always go to the
//! store, so queued writes are invisible until commit.
//!
//! ```
//! use redis_cache_manager::transaction::CacheTransaction;
//!
//! # async fn example() -> redis_cache_manager::Result<()> {
//! let tx = CacheTransaction::new();
//! tx.scope(async {
//!     // cache writes here are deferred
//! })
//! .await;
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

tokio::task_local! {
    static CURRENT: CacheTransaction;
}

/// Deferred cache write.
pub(crate) type DeferredWrite = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

#[derive(Default)]
struct TxState {
    pending: Vec<DeferredWrite>,
    completed: bool,
}

/// Unit of work deferring cache writes until commit.
///
/// Cheap to clone; clones refer to the same transaction.
#[derive(Clone, Default)]
pub struct CacheTransaction {
    state: Arc<Mutex<TxState>>,
}

impl CacheTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transaction bound to the current task, if any.
    pub fn current() -> Option<CacheTransaction> {
        CURRENT.try_with(|tx| tx.clone()).ok()
    }

    /// Run `fut` with this transaction as the ambient one.
    pub async fn scope<F: Future>(&self, fut: F) -> F::Output {
        CURRENT.scope(self.clone(), fut).await
    }

    /// Still accepting writes (neither committed nor rolled back).
    pub fn is_active(&self) -> bool {
        !self.lock().completed
    }

    /// Number of queued writes.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Queue `write`; hands it back when the transaction already completed.
    pub(crate) fn defer(&self, write: DeferredWrite) -> std::result::Result<(), DeferredWrite> {
        let mut state = self.lock();
        if state.completed {
            return Err(write);
        }
        state.pending.push(write);
        Ok(())
    }

    /// Apply queued writes in order.
    ///
    /// Every write is attempted; the first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a deferred write.
    pub async fn commit(self) -> Result<()> {
        let pending = {
            let mut state = self.lock();
            state.completed = true;
            std::mem::take(&mut state.pending)
        };

        debug!("Committing cache transaction ({} writes)", pending.len());

        let mut first_error = None;
        for write in pending {
            if let Err(e) = write().await {
                warn!("Deferred cache write failed on commit: {}", e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Discard queued writes.
    pub fn rollback(self) {
        let mut state = self.lock();
        state.completed = true;
        debug!(
            "Rolled back cache transaction ({} writes discarded)",
            state.pending.len()
        );
        state.pending.clear();
    }

    fn lock(&self) -> MutexGuard<'_, TxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_write(counter: &Arc<AtomicUsize>) -> DeferredWrite {
        let counter = Arc::clone(counter);
        Box::new(move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), Error>(())
            }
            .boxed()
        })
    }

    fn failing_write() -> DeferredWrite {
        Box::new(|| async { Err::<(), Error>(Error::StoreUnavailable("down".to_string())) }.boxed())
    }

    #[tokio::test]
    async fn test_no_ambient_transaction_outside_scope() {
        assert!(CacheTransaction::current().is_none());
    }

    #[tokio::test]
    async fn test_scope_sets_ambient_transaction() {
        let tx = CacheTransaction::new();
        let seen = tx
            .scope(async {
                let current = CacheTransaction::current().expect("ambient transaction");
                let counter = Arc::new(AtomicUsize::new(0));
                assert!(current.defer(counting_write(&counter)).is_ok());
                current.pending()
            })
            .await;

        assert_eq!(seen, 1);
        assert_eq!(tx.pending(), 1);
    }

    #[tokio::test]
    async fn test_commit_applies_writes() {
        let counter = Arc::new(AtomicUsize::new(0));
        let tx = CacheTransaction::new();
        assert!(tx.defer(counting_write(&counter)).is_ok());
        assert!(tx.defer(counting_write(&counter)).is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        let handle = tx.clone();
        tx.commit().await.expect("commit");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(!handle.is_active());
        assert!(handle.defer(counting_write(&counter)).is_err());
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let counter = Arc::new(AtomicUsize::new(0));
        let tx = CacheTransaction::new();
        assert!(tx.defer(counting_write(&counter)).is_ok());

        let handle = tx.clone();
        tx.rollback();
        assert_eq!(handle.pending(), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_commit_reports_first_error_after_running_all() {
        let counter = Arc::new(AtomicUsize::new(0));
        let tx = CacheTransaction::new();
        assert!(tx.defer(failing_write()).is_ok());
        assert!(tx.defer(counting_write(&counter)).is_ok());

        let err = tx.commit().await.unwrap_err();
        assert_eq!(err, Error::StoreUnavailable("down".to_string()));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
