use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, trace};
use crate::auth::oracle::Token;
use crate::core::config::SearchConfig;
use crate::core::error::{Error, Result};
use crate::search::executor::Searcher;
use crate::search::request::SearchRequest;
use crate::search::results::ResultSet;

/// Admission gate in front of a `Searcher`.
///
/// At most `max_concurrent_queries` searches run at once. Waiting callers are
/// admitted in arrival order. A caller whose wait is cancelled, or who waits
/// on a closed throttle, gets `Error::Cancelled` and never reaches the searcher.
pub struct ConcurrencyThrottle {
    inner: Arc<dyn Searcher>,
    gate: Arc<Gate>,
}

/// One semaphore for the throttle's whole life, resized in place
struct Gate {
    permits: Arc<Semaphore>,
    limit: AtomicUsize,
    /// Permits still to retire after a shrink; paid by searches as they finish
    debt: AtomicUsize,
    resize: Mutex<()>,
}

impl Gate {
    /// Take up to `wanted` units of debt; returns how many were taken
    fn take_debt(&self, wanted: usize) -> usize {
        let mut current = self.debt.load(Ordering::SeqCst);
        loop {
            let take = current.min(wanted);
            if take == 0 {
                return 0;
            }
            match self.debt.compare_exchange(current, current - take, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => return take,
                Err(actual) => current = actual,
            }
        }
    }
}

/// A running search's permit. Retired instead of returned while debt is owed.
struct Admission {
    permit: Option<OwnedSemaphorePermit>,
    gate: Arc<Gate>,
}

impl Drop for Admission {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            if self.gate.take_debt(1) == 1 {
                permit.forget();
            }
        }
    }
}

impl ConcurrencyThrottle {
    pub fn new(inner: Arc<dyn Searcher>, max_concurrent_queries: usize) -> Result<Self> {
        check_limit(max_concurrent_queries)?;
        Ok(ConcurrencyThrottle {
            inner,
            gate: Arc::new(Gate {
                permits: Arc::new(Semaphore::new(max_concurrent_queries)),
                limit: AtomicUsize::new(max_concurrent_queries),
                debt: AtomicUsize::new(0),
                resize: Mutex::new(()),
            }),
        })
    }

    pub fn from_config(inner: Arc<dyn Searcher>, config: &SearchConfig) -> Result<Self> {
        ConcurrencyThrottle::new(inner, config.max_concurrent_queries)
    }

    pub fn max_concurrent_queries(&self) -> usize {
        self.gate.limit.load(Ordering::SeqCst)
    }

    /// Permits not held by a running search
    pub fn available_permits(&self) -> usize {
        self.gate.permits.available_permits()
    }

    /// Resize the gate. Growing admits waiters at once. Shrinking retires idle
    /// permits now and the rest as running searches finish, so no new search
    /// is admitted until fewer than the new limit are running.
    pub fn set_max_concurrent_queries(&self, max_concurrent_queries: usize) -> Result<()> {
        check_limit(max_concurrent_queries)?;
        let gate = &self.gate;
        let _resize = gate.resize.lock();

        let previous = gate.limit.swap(max_concurrent_queries, Ordering::SeqCst);
        if max_concurrent_queries > previous {
            let grow = max_concurrent_queries - previous;
            let repaid = gate.take_debt(grow);
            gate.permits.add_permits(grow - repaid);
        } else if max_concurrent_queries < previous {
            gate.debt.fetch_add(previous - max_concurrent_queries, Ordering::SeqCst);
            while gate.take_debt(1) == 1 {
                if gate.permits.forget_permits(1) == 0 {
                    gate.debt.fetch_add(1, Ordering::SeqCst);
                    break;
                }
            }
        }

        debug!(
            from = previous,
            to = max_concurrent_queries,
            owed = gate.debt.load(Ordering::SeqCst),
            "throttle reconfigured"
        );
        Ok(())
    }

    /// Fail every waiting and future caller with `Cancelled`
    pub fn close(&self) {
        self.gate.permits.close();
    }

    pub async fn execute(&self, token: &Token, request: &SearchRequest) -> Result<ResultSet> {
        self.execute_or_cancel(token, request, std::future::pending::<()>()).await
    }

    /// Like `execute`, but gives up waiting for a permit once `cancel` completes.
    /// Cancellation has no effect after the search has been admitted.
    pub async fn execute_or_cancel<C>(&self, token: &Token, request: &SearchRequest, cancel: C) -> Result<ResultSet>
    where
        C: Future,
    {
        let permit = tokio::select! {
            biased;
            _ = cancel => {
                debug!("search cancelled while waiting for a permit");
                return Err(Error::Cancelled);
            }
            permit = self.gate.permits.clone().acquire_owned() => {
                permit.map_err(|_| Error::Cancelled)?
            }
        };
        trace!(available = self.available_permits(), "search admitted");

        let admission = Admission { permit: Some(permit), gate: self.gate.clone() };
        let inner = self.inner.clone();
        let token = token.clone();
        let request = request.clone();

        // The admission lives in the blocking task so it ends on every exit
        let task = tokio::task::spawn_blocking(move || {
            let _admission = admission;
            inner.execute(&token, &request)
        });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(Error::Cancelled),
        }
    }
}

fn check_limit(max_concurrent_queries: usize) -> Result<()> {
    if max_concurrent_queries == 0 {
        return Err(Error::InvalidArgument("max_concurrent_queries must be positive".into()));
    }
    Ok(())
}
