//
// worker.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use tower_lsp::lsp_types::Diagnostic;

use crate::document::TextChange;
use crate::engine::EngineDocumentHandle;
use crate::engine::LintEngine;
use crate::errors::ProcessCrashed;
use crate::fault;

/// A reference to one live worker process hosting a lint engine.
///
/// The handle is shared by every orchestrator currently routed to this
/// worker. The first failing operation, whether reported by the engine or
/// raised by the fault injector, marks the handle crashed. The flag is
/// sticky: all later operations fail synchronously with [`ProcessCrashed`]
/// without reaching the engine, so callers never race a zombie process.
pub struct WorkerHandle {
    id: u64,
    engine: Box<dyn LintEngine>,
    crashed: AtomicBool,
}

impl WorkerHandle {
    pub(crate) fn new(id: u64, engine: Box<dyn LintEngine>) -> Self {
        Self {
            id,
            engine,
            crashed: AtomicBool::new(false),
        }
    }

    /// Identifier of the underlying process, unique within the manager
    /// that provisioned it.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_crashed(&self) -> bool {
        self.crashed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_crashed(&self) {
        if !self.crashed.swap(true, Ordering::AcqRel) {
            log::warn!("worker {}: crashed, handle retired", self.id);
        }
    }

    pub async fn create_document(&self, text: &str) -> Result<EngineDocumentHandle, ProcessCrashed> {
        self.begin_op("create_document")?;
        self.watch(self.engine.create_document(text).await)
    }

    pub async fn apply_change(
        &self,
        doc: EngineDocumentHandle,
        change: &TextChange,
    ) -> Result<(), ProcessCrashed> {
        self.begin_op("apply_change")?;
        self.watch(self.engine.apply_change(doc, change).await)
    }

    pub async fn lint(&self, doc: EngineDocumentHandle) -> Result<Vec<Diagnostic>, ProcessCrashed> {
        self.begin_op("lint")?;
        self.watch(self.engine.lint(doc).await)
    }

    pub async fn destroy_document(&self, doc: EngineDocumentHandle) -> Result<(), ProcessCrashed> {
        self.begin_op("destroy_document")?;
        self.watch(self.engine.destroy_document(doc).await)
    }

    // Sticky-crash check plus fault injection. Runs before the engine sees
    // the operation, so an injected crash leaves engine-side state exactly
    // as it was.
    fn begin_op(&self, op: &str) -> Result<(), ProcessCrashed> {
        if self.is_crashed() {
            return Err(ProcessCrashed);
        }

        if let Err(crash) = fault::maybe_inject_fault(self, op) {
            log::warn!("worker {}: fault injected at `{op}`", self.id);
            self.mark_crashed();
            return Err(crash);
        }

        Ok(())
    }

    fn watch<T>(&self, result: Result<T, ProcessCrashed>) -> Result<T, ProcessCrashed> {
        if result.is_err() {
            self.mark_crashed();
        }
        result
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // The last orchestrator let go; the engine is torn down with us.
        log::info!("worker {}: torn down", self.id);
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("crashed", &self.is_crashed())
            .finish()
    }
}
