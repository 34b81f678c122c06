//
// manager.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::engine::LintEngine;
use crate::worker::WorkerHandle;

/// Launches worker processes on demand. Production implementations start an
/// isolated runtime and hand back a proxy engine speaking to it; spawning
/// can suspend and can fail.
#[async_trait]
pub trait WorkerSpawner: Send + Sync {
    async fn spawn_worker(&self) -> anyhow::Result<Box<dyn LintEngine>>;
}

/// Registry handing out one shared [`WorkerHandle`] to the linters of any
/// number of documents.
///
/// A worker is provisioned lazily on the first acquire and again whenever
/// the previously handed out worker has been observed crashed; a handle
/// observed crashed is never handed out again. The manager only keeps a
/// weak back reference: the worker is owned by the linters holding it and
/// is torn down when the last of them lets go.
pub struct DocumentProcessManager {
    spawner: Box<dyn WorkerSpawner>,

    /// The worker most recently handed out. Guarded by an async mutex so
    /// that acquires racing one spawn all receive the same fresh handle.
    current: Mutex<Weak<WorkerHandle>>,

    processes_ever_created: AtomicU64,
}

impl DocumentProcessManager {
    pub fn new(spawner: Box<dyn WorkerSpawner>) -> Self {
        Self {
            spawner,
            current: Mutex::new(Weak::new()),
            processes_ever_created: AtomicU64::new(0),
        }
    }

    /// Returns a live worker, creating one if there is none or if the
    /// current one has crashed.
    pub async fn acquire_worker(&self) -> anyhow::Result<Arc<WorkerHandle>> {
        let mut current = self.current.lock().await;

        if let Some(worker) = current.upgrade() {
            if !worker.is_crashed() {
                return Ok(worker);
            }
        }

        let engine = self.spawner.spawn_worker().await?;
        let id = self.processes_ever_created.fetch_add(1, Ordering::SeqCst) + 1;
        let worker = Arc::new(WorkerHandle::new(id, engine));
        log::info!("provisioned linter worker {id}");

        *current = Arc::downgrade(&worker);
        Ok(worker)
    }

    /// Marks `worker` terminally crashed. The next [`Self::acquire_worker`]
    /// provisions a fresh one; linters still holding `worker` observe the
    /// crash on their next call and run their own recovery.
    pub fn report_crashed(&self, worker: &WorkerHandle) {
        worker.mark_crashed();
    }

    /// Monotonically non-decreasing count of workers ever provisioned.
    pub fn number_of_processes_ever_created(&self) -> u64 {
        self.processes_ever_created.load(Ordering::SeqCst)
    }
}
