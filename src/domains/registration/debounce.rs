use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Fields validated inline while the operator types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebouncedField {
    ParticipantId,
    Phone,
}

/// One delayed job per key. Scheduling a key again aborts its pending job (last write wins).
///
/// Jobs run on the runtime captured at construction, so `schedule` may be called from
/// threads that are not inside a runtime.
pub struct FieldDebouncer<K> {
    delay: Duration,
    runtime: Option<Handle>,
    jobs: HashMap<K, JoinHandle<()>>,
}

impl<K: Eq + Hash + std::fmt::Debug> FieldDebouncer<K> {
    /// Uses the current runtime when there is one
    pub fn new(delay: Duration) -> Self {
        Self::with_runtime(delay, Handle::try_current().ok())
    }

    pub fn with_runtime(delay: Duration, runtime: Option<Handle>) -> Self {
        Self {
            delay,
            runtime,
            jobs: HashMap::new(),
        }
    }

    pub fn schedule<F>(&mut self, key: K, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Some(previous) = self.jobs.remove(&key) {
            previous.abort();
        }
        let runtime = match self.runtime.clone().or_else(|| Handle::try_current().ok()) {
            Some(runtime) => runtime,
            None => {
                log::warn!("No async runtime available, skipping inline validation for {:?}", key);
                return;
            }
        };
        log::debug!("Scheduling inline validation for {:?} in {:?}", key, self.delay);
        let delay = self.delay;
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            job.await;
        });
        self.jobs.insert(key, handle);
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.jobs.drain() {
            handle.abort();
        }
    }
}

impl<K> Drop for FieldDebouncer<K> {
    fn drop(&mut self) {
        for (_, handle) in self.jobs.drain() {
            handle.abort();
        }
    }
}
