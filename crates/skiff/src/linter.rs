//
// linter.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::document::LintableDocument;
use crate::document::TextChange;
use crate::engine::EngineDocumentHandle;
use crate::errors::LinterError;
use crate::errors::ProcessCrashed;
use crate::manager::DocumentProcessManager;
use crate::worker::WorkerHandle;

/// Tuning knobs for a [`DocumentLinter`].
#[derive(Clone, Debug)]
pub struct LinterConfig {
    /// How many consecutive recoveries one `text_changed` operation may
    /// attempt before the crash is surfaced as
    /// [`LinterError::LintingCrashed`]. Every attempt provisions a fresh
    /// worker, so this only matters when replacement workers keep dying.
    pub max_consecutive_recoveries: usize,
}

impl Default for LinterConfig {
    fn default() -> Self {
        Self {
            max_consecutive_recoveries: 8,
        }
    }
}

enum OpKind {
    OpenEditor,
    ApplyChanges(Vec<TextChange>),
}

struct PendingOp {
    /// Position of this operation in the enqueue order. Used to decide
    /// whether a snapshot of the editor text already contains the
    /// operation's changes.
    seq: u64,
    kind: OpKind,
    reply_tx: oneshot::Sender<Result<(), LinterError>>,
}

/// Per-document orchestrator between an editor document and the lint engine
/// hosted in a shared worker process.
///
/// Every public operation appends to a single causal queue and returns once
/// its own entry has been executed: a dedicated driver task drains the
/// queue head-of-line, so even operations issued back to back without
/// awaiting complete strictly in call order, and their engine-side effects
/// happen in that order too.
///
/// Worker crashes on the edit path are absorbed: the linter reports the
/// worker to the manager, acquires a fresh one, rebuilds the engine-side
/// document from the current editor text (which reflects every edit the
/// editor has applied) and relints. Crashes during a visibility round trip
/// are surfaced as [`LinterError::LintingCrashed`] instead; the linter
/// stays usable and the next call re-enters recovery.
///
/// Must be created from within a tokio runtime.
pub struct DocumentLinter {
    ops_tx: UnboundedSender<PendingOp>,
    enqueue_seq: Arc<AtomicU64>,
    dispose: CancellationToken,
}

impl DocumentLinter {
    pub fn new(document: Arc<dyn LintableDocument>, manager: Arc<DocumentProcessManager>) -> Self {
        Self::with_config(document, manager, LinterConfig::default())
    }

    pub fn with_config(
        document: Arc<dyn LintableDocument>,
        manager: Arc<DocumentProcessManager>,
        config: LinterConfig,
    ) -> Self {
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let enqueue_seq = Arc::new(AtomicU64::new(0));
        let dispose = CancellationToken::new();

        let driver = Driver {
            document,
            manager,
            config,
            ops_rx,
            dispose: dispose.clone(),
            enqueue_seq: enqueue_seq.clone(),
            worker: None,
            engine_doc: None,
            merged_seq: 0,
        };
        tokio::spawn(driver.run());

        Self {
            ops_tx,
            enqueue_seq,
            dispose,
        }
    }

    /// The editor opened or re-revealed this document: ensure the engine
    /// has a document for it, lint, and publish diagnostics. Idempotent; a
    /// second call on an already-open linter still round-trips through the
    /// engine to relint the current text.
    pub async fn editor_changed_visibility(&self) -> Result<(), LinterError> {
        self.submit(OpKind::OpenEditor).await
    }

    /// The editor has just applied `changes` to the document: forward them
    /// to the engine, relint, and publish diagnostics. The engine document
    /// is driven by the change list alone; the editor text is never
    /// re-read on this path, since later edits may already have moved it.
    pub async fn text_changed(&self, changes: Vec<TextChange>) -> Result<(), LinterError> {
        self.submit(OpKind::ApplyChanges(changes)).await
    }

    /// Dispose the linter. Waits for the in-flight operation to settle,
    /// fails every queued one with [`LinterError::Disposed`], releases the
    /// engine-side document and clears the published diagnostics.
    /// Idempotent, and never fails.
    pub async fn dispose(&self) {
        self.dispose.cancel();

        // Resolves once the driver has torn everything down and dropped
        // the receiving half of the queue.
        self.ops_tx.closed().await;
    }

    async fn submit(&self, kind: OpKind) -> Result<(), LinterError> {
        let reply_rx = self.enqueue(kind)?;

        // The driver settles every operation it accepts; an unanswered
        // reply means it went away mid-dispose.
        reply_rx.await.unwrap_or(Err(LinterError::Disposed))
    }

    fn enqueue(
        &self,
        kind: OpKind,
    ) -> Result<oneshot::Receiver<Result<(), LinterError>>, LinterError> {
        if self.dispose.is_cancelled() {
            return Err(LinterError::Disposed);
        }

        let seq = self.enqueue_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let (reply_tx, reply_rx) = oneshot::channel();

        self.ops_tx
            .send(PendingOp {
                seq,
                kind,
                reply_tx,
            })
            .map_err(|_| LinterError::Disposed)?;

        Ok(reply_rx)
    }
}

impl Drop for DocumentLinter {
    fn drop(&mut self) {
        // Tear down in the background; the driver destroys the engine-side
        // document and clears diagnostics on its way out.
        self.dispose.cancel();
    }
}

/// The task that owns one linter's engine-side state and drains its
/// operation queue one entry at a time.
struct Driver {
    document: Arc<dyn LintableDocument>,
    manager: Arc<DocumentProcessManager>,
    config: LinterConfig,
    ops_rx: UnboundedReceiver<PendingOp>,
    dispose: CancellationToken,
    enqueue_seq: Arc<AtomicU64>,

    /// Worker currently believed healthy, if any.
    worker: Option<Arc<WorkerHandle>>,

    /// Engine-side document living inside `worker`. Dropped together with
    /// the worker on any crash.
    engine_doc: Option<EngineDocumentHandle>,

    /// Enqueue position up to which queued changes are already reflected in
    /// the engine-side document, because it was materialized from editor
    /// text that contained them. Change operations at or below this mark
    /// must not re-apply their change lists.
    merged_seq: u64,
}

impl Driver {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                _ = self.dispose.cancelled() => break,

                op = self.ops_rx.recv() => match op {
                    Some(op) => self.process(op).await,
                    None => break, // linter handle dropped
                },
            }
        }

        self.shutdown().await;
    }

    async fn process(&mut self, op: PendingOp) {
        let PendingOp {
            seq,
            kind,
            reply_tx,
        } = op;

        let result = match kind {
            OpKind::OpenEditor => self.open_editor().await,
            OpKind::ApplyChanges(changes) => self.apply_changes(seq, &changes).await,
        };

        // The caller may have dropped its future; that's fine.
        let _ = reply_tx.send(result);
    }

    /// One visibility round trip. A crash is cleaned up and surfaced to
    /// the caller; re-materialization is left to the next operation.
    async fn open_editor(&mut self) -> Result<(), LinterError> {
        match self.lint_current().await {
            Ok(()) => Ok(()),
            Err(ProcessCrashed) => {
                self.observe_crash();

                if self.dispose.is_cancelled() {
                    Err(LinterError::Disposed)
                } else {
                    Err(LinterError::LintingCrashed)
                }
            },
        }
    }

    /// One edit round trip. Crashes are absorbed by rebuilding the engine
    /// document from the current editor text on a fresh worker, up to the
    /// configured number of consecutive attempts.
    async fn apply_changes(&mut self, seq: u64, changes: &[TextChange]) -> Result<(), LinterError> {
        let mut recoveries = 0;

        loop {
            match self.try_apply_changes(seq, changes).await {
                Ok(()) => return Ok(()),
                Err(ProcessCrashed) => {},
            }

            self.observe_crash();

            if self.dispose.is_cancelled() {
                // The linter is being torn down; settle as disposed rather
                // than keep chewing through fresh workers.
                return Err(LinterError::Disposed);
            }

            if recoveries == self.config.max_consecutive_recoveries {
                log::error!(
                    "giving up on edit after {recoveries} failed recoveries, each on a fresh worker"
                );
                return Err(LinterError::LintingCrashed);
            }

            recoveries += 1;
            log::warn!("worker crashed while linting edit; recovering (attempt {recoveries})");
        }
    }

    async fn try_apply_changes(
        &mut self,
        seq: u64,
        changes: &[TextChange],
    ) -> Result<(), ProcessCrashed> {
        let worker = self.ensure_worker().await?;

        let Some(doc) = self.engine_doc else {
            // Never opened, or the document died with a crashed worker.
            // The editor applied `changes` to its text before calling us,
            // so materializing from the current text subsumes them and a
            // single fresh lint is equivalent to applying-then-linting.
            return self.lint_current().await;
        };

        if seq > self.merged_seq {
            for change in changes {
                worker.apply_change(doc, change).await?;
            }
        }

        let diagnostics = worker.lint(doc).await?;
        self.document.set_diagnostics(diagnostics);
        Ok(())
    }

    /// Ensure worker and engine-side document exist, lint, publish. The
    /// only place that reads the editor text.
    async fn lint_current(&mut self) -> Result<(), ProcessCrashed> {
        let worker = self.ensure_worker().await?;

        let doc = match self.engine_doc {
            Some(doc) => doc,
            None => {
                // Everything enqueued up to now had its changes applied to
                // the editor text before we read it; later entries did not.
                let merged = self.enqueue_seq.load(Ordering::SeqCst);
                let text = self.document.text();

                let doc = worker.create_document(&text).await?;
                self.engine_doc = Some(doc);
                self.merged_seq = merged;
                doc
            },
        };

        let diagnostics = worker.lint(doc).await?;
        self.document.set_diagnostics(diagnostics);
        Ok(())
    }

    async fn ensure_worker(&mut self) -> Result<Arc<WorkerHandle>, ProcessCrashed> {
        let stale = match &self.worker {
            Some(worker) if !worker.is_crashed() => return Ok(worker.clone()),
            Some(_) => true,
            None => false,
        };

        if stale {
            // A sibling linter crashed the shared worker since our last
            // call; our engine document died with it.
            self.observe_crash();
        }

        match self.manager.acquire_worker().await {
            Ok(worker) => {
                self.worker = Some(worker.clone());
                Ok(worker)
            },
            Err(err) => {
                log::error!("couldn't spawn a linter worker: {err:?}");
                Err(ProcessCrashed)
            },
        }
    }

    /// Forget the crashed worker and the engine document that died with it,
    /// and let the manager know so nobody else gets this handle.
    fn observe_crash(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.manager.report_crashed(&worker);
        }
        self.engine_doc = None;
    }

    /// Dispose path: refuse the rest of the queue and release engine
    /// resources. Runs exactly once, after the in-flight operation (if
    /// any) has settled.
    async fn shutdown(mut self) {
        while let Ok(op) = self.ops_rx.try_recv() {
            let _ = op.reply_tx.send(Err(LinterError::Disposed));
        }

        if let (Some(worker), Some(doc)) = (self.worker.take(), self.engine_doc.take()) {
            // Crashes during teardown are ignored.
            if worker.destroy_document(doc).await.is_err() {
                log::warn!(
                    "worker {}: crashed while destroying the engine document",
                    worker.id()
                );
            }
        }

        self.document.remove_diagnostics();
        log::trace!("document linter disposed");

        // Dropping `ops_rx` here closes the channel, which is what lets
        // `dispose()` return: nothing can observe a half-torn-down linter.
    }
}
