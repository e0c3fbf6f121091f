//! Bounded registry of running jobs.
//!
//! Capacity is a semaphore fixed at construction. A job can only be spawned
//! with a [`SlotPermit`], so the number of registered jobs never exceeds
//! capacity. Each spawned task carries a guard that removes its entry and
//! then releases the permit when the task ends, whether it returns, panics or
//! is aborted.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use deckbench_core::types::DbId;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

type Running = Arc<Mutex<HashMap<DbId, JoinHandle<()>>>>;

/// One reserved execution slot.
#[derive(Debug)]
pub struct SlotPermit(OwnedSemaphorePermit);

/// Outcome of [`JobRegistry::drain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub finished: usize,
    pub aborted: usize,
}

/// Tracks running job tasks keyed by job id.
#[derive(Debug)]
pub struct JobRegistry {
    capacity: usize,
    slots: Arc<Semaphore>,
    running: Running,
}

/// Removes the registry entry, then frees the slot, when dropped.
struct RunningGuard {
    id: DbId,
    running: Running,
    _permit: SlotPermit,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        lock(&self.running).remove(&self.id);
    }
}

fn lock(running: &Running) -> MutexGuard<'_, HashMap<DbId, JoinHandle<()>>> {
    // A poisoned map is still structurally valid.
    running.lock().unwrap_or_else(|e| e.into_inner())
}

impl JobRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not reserved or running.
    pub fn free_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Reserve a slot without waiting. `None` when the registry is full.
    pub fn try_reserve(&self) -> Option<SlotPermit> {
        Arc::clone(&self.slots).try_acquire_owned().ok().map(SlotPermit)
    }

    /// Run `task` for job `id` on its own tokio task, holding `permit` until
    /// it ends.
    pub fn spawn<F>(&self, id: DbId, permit: SlotPermit, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = RunningGuard {
            id,
            running: Arc::clone(&self.running),
            _permit: permit,
        };
        // Hold the lock across spawn and insert so a task that finishes
        // immediately cannot remove its entry before it exists.
        let mut running = lock(&self.running);
        let handle = tokio::spawn(async move {
            let _guard = guard;
            task.await;
        });
        running.insert(id, handle);
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        lock(&self.running).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: DbId) -> bool {
        lock(&self.running).contains_key(&id)
    }

    pub fn running_ids(&self) -> Vec<DbId> {
        lock(&self.running).keys().copied().collect()
    }

    /// Wait up to `timeout` for every running task, then abort the rest.
    pub async fn drain(&self, timeout: Duration) -> DrainReport {
        let handles: Vec<(DbId, JoinHandle<()>)> = lock(&self.running).drain().collect();
        let deadline = tokio::time::Instant::now() + timeout;
        let mut report = DrainReport {
            finished: 0,
            aborted: 0,
        };

        for (id, mut handle) in handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(_) => report.finished += 1,
                Err(_) => {
                    tracing::warn!(job_id = %id, "Aborting job still running at shutdown");
                    handle.abort();
                    report.aborted += 1;
                }
            }
        }
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
