//
// engine.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use async_trait::async_trait;
use tower_lsp::lsp_types::Diagnostic;

use crate::document::TextChange;
use crate::errors::ProcessCrashed;

/// Token by which a worker identifies one engine-side document. Only valid
/// while the worker that minted it is alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EngineDocumentHandle(u64);

impl EngineDocumentHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The lint engine hosted by one worker process. Implementations are
/// proxies: every call crosses the process boundary and can fail with
/// [`ProcessCrashed`] at any time.
#[async_trait]
pub trait LintEngine: Send + Sync {
    /// Create an engine-side document initialized to `text`.
    async fn create_document(&self, text: &str) -> Result<EngineDocumentHandle, ProcessCrashed>;

    /// Incrementally mutate the engine-side text.
    async fn apply_change(
        &self,
        doc: EngineDocumentHandle,
        change: &TextChange,
    ) -> Result<(), ProcessCrashed>;

    /// Lint the current engine-side text.
    async fn lint(&self, doc: EngineDocumentHandle) -> Result<Vec<Diagnostic>, ProcessCrashed>;

    /// Release engine resources held for `doc`.
    async fn destroy_document(&self, doc: EngineDocumentHandle) -> Result<(), ProcessCrashed>;
}
