//
// document.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::sync::Mutex;

use ropey::Rope;
use tower_lsp::lsp_types::Diagnostic;
use tower_lsp::lsp_types::Position;
use tower_lsp::lsp_types::Range;

use crate::document::LintableDocument;
use crate::document::TextChange;

/// In-memory stand-in for an editor document: a rope of text plus the most
/// recently published diagnostic set.
pub struct FakeDocument {
    contents: Mutex<Rope>,
    diagnostics: Mutex<Option<Vec<Diagnostic>>>,
}

impl FakeDocument {
    pub fn new(text: &str) -> Self {
        Self {
            contents: Mutex::new(Rope::from(text)),
            diagnostics: Mutex::new(None),
        }
    }

    /// Apply an edit the way an editor would: mutate the stored text first,
    /// then hand back the change to forward to a linter.
    pub fn edit(&self, range: Range, text: &str) -> TextChange {
        let mut contents = self.contents.lock().unwrap();

        let start =
            contents.line_to_char(range.start.line as usize) + range.start.character as usize;
        let end = contents.line_to_char(range.end.line as usize) + range.end.character as usize;

        contents.remove(start..end);
        contents.insert(start, text);

        TextChange::new(range, text)
    }

    /// Append `text` at the very end of the document.
    pub fn append(&self, text: &str) -> TextChange {
        let end = {
            let contents = self.contents.lock().unwrap();
            let line = contents.len_lines() - 1;
            let character = contents.line(line).len_chars();
            Position::new(line as u32, character as u32)
        };

        self.edit(Range::new(end, end), text)
    }

    /// The most recently published diagnostic set. `None` if diagnostics
    /// were never published, or were removed.
    pub fn diagnostics(&self) -> Option<Vec<Diagnostic>> {
        self.diagnostics.lock().unwrap().clone()
    }
}

impl LintableDocument for FakeDocument {
    fn text(&self) -> String {
        self.contents.lock().unwrap().to_string()
    }

    fn set_diagnostics(&self, diagnostics: Vec<Diagnostic>) {
        *self.diagnostics.lock().unwrap() = Some(diagnostics);
    }

    fn remove_diagnostics(&self) {
        *self.diagnostics.lock().unwrap() = None;
    }
}
