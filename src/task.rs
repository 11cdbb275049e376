use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::error::{BoxError, TaskError};
use crate::expiring::Expiring;

pub type BoxFut<'a, O> = Pin<Box<dyn Future<Output = O> + Send + 'a>>;

/// A producer outcome that can be awaited by any number of callers.
///
/// Every clone resolves to the same value; the producer future is polled once.
pub type Pending<T> = Shared<BoxFut<'static, Result<T, TaskError>>>;

/// Configuration for a [`MemoizedTask`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskConfig {
    /// How long a cached result stays valid after it was created. `None` never expires.
    pub expiry: Option<Duration>,
}

impl TaskConfig {
    pub fn expire_after(expiry: Duration) -> Self {
        Self {
            expiry: Some(expiry),
        }
    }

    pub fn expire_after_millis(millis: u64) -> Self {
        Self::expire_after(Duration::from_millis(millis))
    }
}

struct Slot<T> {
    generation: u64,
    current: Option<Expiring<Pending<T>>>,
    timer: Option<JoinHandle<()>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            generation: 0,
            current: None,
            timer: None,
        }
    }

    /// Drops the cached result and its timer. Returns whether anything was cached.
    fn reset(&mut self) -> bool {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.current.take().is_some()
    }

    /// Like [`Slot::reset`], but only if `generation` is still the cached one
    fn evict(&mut self, generation: u64) -> bool {
        self.generation == generation && self.reset()
    }
}

/// Memoizes an async producer behind a single shared result.
///
/// The first call to [`start`](Self::start) or [`finish`](Self::finish) invokes
/// the producer; every later call gets the same pending result until it
/// expires, is cleared, or the producer fails. [`finish`](Self::finish) runs
/// the transform over the shared value on every call.
pub struct MemoizedTask<A, T, R, P, F> {
    producer: P,
    transform: F,
    expiry: Option<Duration>,
    slot: Arc<Mutex<Slot<T>>>,
    _marker: PhantomData<fn(&A) -> R>,
}

impl<A, T, R, P, F> MemoizedTask<A, T, R, P, F>
where
    T: Clone + Send + Sync + 'static,
    P: Fn(&A) -> BoxFut<'static, Result<T, BoxError>>,
    F: Fn(T, &A) -> Result<R, BoxError>,
{
    /// Creates a task whose cached result never expires
    pub fn new(producer: P, transform: F) -> Self {
        Self::with_config(producer, transform, TaskConfig::default())
    }

    pub fn with_config(producer: P, transform: F, config: TaskConfig) -> Self {
        Self {
            producer,
            transform,
            expiry: config.expiry,
            slot: Arc::new(Mutex::new(Slot::new())),
            _marker: PhantomData,
        }
    }

    /// Sets how long a cached result stays valid after it was created
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn expiry(&self) -> Option<Duration> {
        self.expiry
    }

    /// Returns the cached pending result, invoking the producer if there is none.
    ///
    /// Inside a tokio runtime the producer is driven in the background, so the
    /// result makes progress even if nobody awaits it yet.
    pub fn start(&self, args: A) -> Pending<T> {
        self.start_with(&args)
    }

    /// Awaits the cached result and applies the transform to it
    pub async fn finish(&self, args: A) -> Result<R, TaskError> {
        self.finish_with(&args).await
    }

    /// Starts the producer for `args` now and keeps the arguments for later calls
    pub fn bind(&self, args: A) -> Bound<'_, A, T, R, P, F> {
        let _pending = self.start_with(&args);
        Bound { task: self, args }
    }

    /// Discards the cached result. The next call invokes the producer again.
    pub fn clear(&self) {
        if self.slot.lock().reset() {
            debug!("cleared cached result");
        }
    }

    /// Whether a non-expired result is cached
    pub fn is_cached(&self) -> bool {
        self.slot
            .lock()
            .current
            .as_ref()
            .is_some_and(|entry| !entry.is_expired())
    }

    /// The cached outcome if the producer has already resolved, without waiting
    pub fn peek(&self) -> Option<Result<T, TaskError>> {
        let slot = self.slot.lock();
        let entry = slot.current.as_ref().filter(|entry| !entry.is_expired())?;
        entry.value.peek().cloned()
    }

    fn start_with(&self, args: &A) -> Pending<T> {
        let mut slot = self.slot.lock();

        if let Some(entry) = slot.current.as_ref() {
            if !entry.is_expired() {
                trace!(generation = slot.generation, "serving cached result");
                return entry.value.clone();
            }
            debug!(age = ?entry.age(), expiry = ?self.expiry, "cached result expired");
        }

        slot.generation += 1;
        let generation = slot.generation;
        let pending = self.produce(args, generation);
        slot.current = Some(Expiring::with_duration(pending.clone(), self.expiry));
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(pending.clone().map(drop));
                if let Some(expiry) = self.expiry {
                    let weak = Arc::downgrade(&self.slot);
                    slot.timer = Some(handle.spawn(expire_after(weak, generation, expiry)));
                }
            }
            Err(_) => trace!(generation, "no runtime, producer runs on first await"),
        }

        pending
    }

    fn produce(&self, args: &A, generation: u64) -> Pending<T> {
        debug!(generation, "invoking producer");
        let fut = (self.producer)(args);
        let slot = Arc::downgrade(&self.slot);

        let pending: BoxFut<'static, Result<T, TaskError>> = Box::pin(async move {
            let result = fut.await.map_err(TaskError::producer);
            if let Err(err) = &result {
                if let Some(slot) = slot.upgrade() {
                    if slot.lock().evict(generation) {
                        debug!(generation, error = %err, "evicted failed result");
                    }
                }
            }
            result
        });
        pending.shared()
    }

    async fn finish_with(&self, args: &A) -> Result<R, TaskError> {
        let value = self.start_with(args).await?;
        (self.transform)(value, args).map_err(|err| {
            debug!(error = %err, "transform failed");
            TaskError::transform(err)
        })
    }
}

async fn expire_after<T>(slot: Weak<Mutex<Slot<T>>>, generation: u64, expiry: Duration)
where
    T: Send + Sync + 'static,
{
    tokio::time::sleep(expiry).await;

    let Some(slot) = slot.upgrade() else {
        return;
    };
    let mut slot = slot.lock();
    if slot.generation == generation {
        // this task is the timer; drop the handle instead of aborting ourselves
        slot.timer = None;
        if slot.current.take().is_some() {
            debug!(generation, ?expiry, "expiry timer cleared cached result");
        }
    }
}

impl<A, T, R, P, F> Drop for MemoizedTask<A, T, R, P, F> {
    fn drop(&mut self) {
        if let Some(timer) = self.slot.lock().timer.take() {
            timer.abort();
        }
    }
}

impl<A, T, R, P, F> fmt::Debug for MemoizedTask<A, T, R, P, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("MemoizedTask")
            .field("expiry", &self.expiry)
            .field("generation", &slot.generation)
            .field("cached", &slot.current.is_some())
            .finish()
    }
}

/// A [`MemoizedTask`] together with the arguments it was started with
pub struct Bound<'a, A, T, R, P, F> {
    task: &'a MemoizedTask<A, T, R, P, F>,
    args: A,
}

impl<A, T, R, P, F> Bound<'_, A, T, R, P, F>
where
    T: Clone + Send + Sync + 'static,
    P: Fn(&A) -> BoxFut<'static, Result<T, BoxError>>,
    F: Fn(T, &A) -> Result<R, BoxError>,
{
    pub fn args(&self) -> &A {
        &self.args
    }

    pub fn start(&self) -> Pending<T> {
        self.task.start_with(&self.args)
    }

    pub async fn finish(&self) -> Result<R, TaskError> {
        self.task.finish_with(&self.args).await
    }
}
