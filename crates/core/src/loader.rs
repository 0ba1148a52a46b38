//! Memoized, at-most-once asynchronous initialization.
//!
//! A [`LazyLoader`] runs its load function the first time [`LazyLoader::acquire`]
//! is called. Callers that arrive while that load is still in flight attach to
//! the same shared future instead of starting another one. A failed load rejects
//! every caller attached to it and puts the loader back into the unloaded state,
//! so the next call starts a fresh attempt.

use crate::error::{ConversionError, Result};
use futures::future::{BoxFuture, FutureExt, Shared, TryFutureExt};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

type SharedLoad<T> = Shared<BoxFuture<'static, std::result::Result<T, Arc<ConversionError>>>>;

type LoadFn<T> = dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync;

/// Load state of a [`LazyLoader`].
enum LoadState<T> {
    Unloaded,
    Loading(SharedLoad<T>),
    Loaded(T),
}

impl<T> LoadState<T> {
    fn name(&self) -> &'static str {
        match self {
            LoadState::Unloaded => "unloaded",
            LoadState::Loading(_) => "loading",
            LoadState::Loaded(_) => "loaded",
        }
    }
}

/// Lazily loads a value once and shares it with every caller.
pub struct LazyLoader<T> {
    state: Mutex<LoadState<T>>,
    load_fn: Box<LoadFn<T>>,
    /// Number of times the load function has been started.
    attempts: AtomicUsize,
}

impl<T> std::fmt::Debug for LazyLoader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyLoader")
            .field("state", &self.state.lock().name())
            .field("attempts", &self.attempts.load(Ordering::SeqCst))
            .finish()
    }
}

impl<T> LazyLoader<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a loader around an async load function. Nothing runs until the
    /// first call to [`acquire`](Self::acquire).
    pub fn new<F, Fut>(load_fn: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            state: Mutex::new(LoadState::Unloaded),
            load_fn: Box::new(move || load_fn().boxed()),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Get the loaded value, loading it first if needed.
    ///
    /// Returns immediately once loaded. While a load is in flight every caller
    /// awaits the same attempt and sees the same outcome.
    pub async fn acquire(&self) -> Result<T> {
        let pending = {
            let mut state = self.state.lock();
            if let LoadState::Loaded(value) = &*state {
                return Ok(value.clone());
            }
            if let LoadState::Loading(pending) = &*state {
                debug!("Load already in flight, attaching");
                pending.clone()
            } else {
                let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                debug!("Starting load attempt {}", attempt);
                let pending = (self.load_fn)().map_err(Arc::new).boxed().shared();
                *state = LoadState::Loading(pending.clone());
                pending
            }
        };

        let outcome = pending.clone().await;
        self.settle(&pending, &outcome);
        outcome.map_err(ConversionError::Shared)
    }

    /// Record the outcome of `pending`, unless another attempt has replaced it.
    fn settle(
        &self,
        pending: &SharedLoad<T>,
        outcome: &std::result::Result<T, Arc<ConversionError>>,
    ) {
        let mut state = self.state.lock();
        let is_current = matches!(&*state, LoadState::Loading(current) if current.ptr_eq(pending));
        if !is_current {
            return;
        }

        match outcome {
            Ok(value) => *state = LoadState::Loaded(value.clone()),
            Err(e) => {
                warn!("Load failed, next acquire will retry: {}", e);
                *state = LoadState::Unloaded;
            }
        }
    }

    /// Whether the value has been loaded.
    pub fn is_loaded(&self) -> bool {
        matches!(&*self.state.lock(), LoadState::Loaded(_))
    }

    /// Current state as `"unloaded"`, `"loading"` or `"loaded"`.
    pub fn state_name(&self) -> &'static str {
        self.state.lock().name()
    }

    /// Number of load attempts started so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}
