//
// document.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use tower_lsp::lsp_types::Diagnostic;
use tower_lsp::lsp_types::Range;

/// One incremental edit as reported by the editor: replace the text inside
/// `range` with `text`. Positions are zero-based line/character pairs and
/// always refer to the document as it was just before this change.
#[derive(Clone, Debug, PartialEq)]
pub struct TextChange {
    pub range: Range,
    pub text: String,
}

impl TextChange {
    pub fn new(range: Range, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }
}

/// The editor-side view of one open document.
///
/// The linter reads `text()` only when it first materializes an engine-side
/// document and when it rebuilds one after a worker crash; on the edit path
/// it is driven exclusively by [`TextChange`] lists, because by the time a
/// change is processed a later edit may already have moved the editor text
/// on.
pub trait LintableDocument: Send + Sync {
    /// Current editor text, reflecting every edit applied so far.
    fn text(&self) -> String;

    /// Replace the full diagnostic set.
    fn set_diagnostics(&self, diagnostics: Vec<Diagnostic>);

    /// Clear the diagnostic set.
    fn remove_diagnostics(&self);
}
