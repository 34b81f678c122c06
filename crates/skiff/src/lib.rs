//
// lib.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

//! Skiff sits between an editor and a lint engine hosted in an
//! out-of-process worker. Each open document gets one [`DocumentLinter`]
//! that streams incremental edits to the engine, relints after every
//! change, publishes diagnostics back to the document, and transparently
//! provisions a fresh worker when the current one crashes. Workers are
//! shared across documents through a [`DocumentProcessManager`].

pub mod document;
pub mod engine;
pub mod errors;
pub mod fault;
pub mod linter;
pub mod manager;
pub mod schedule;
pub mod worker;

#[cfg(any(test, feature = "testing"))]
pub mod fixtures;

pub use crate::document::LintableDocument;
pub use crate::document::TextChange;
pub use crate::engine::EngineDocumentHandle;
pub use crate::engine::LintEngine;
pub use crate::errors::LinterError;
pub use crate::errors::ProcessCrashed;
pub use crate::linter::DocumentLinter;
pub use crate::linter::LinterConfig;
pub use crate::manager::DocumentProcessManager;
pub use crate::manager::WorkerSpawner;
pub use crate::schedule::ScheduleEnumerator;
pub use crate::worker::WorkerHandle;
