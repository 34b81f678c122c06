//
// engine.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use ropey::Rope;
use tower_lsp::lsp_types::Diagnostic;
use tower_lsp::lsp_types::DiagnosticSeverity;
use tower_lsp::lsp_types::NumberOrString;
use tower_lsp::lsp_types::Position;
use tower_lsp::lsp_types::Range;

use crate::document::TextChange;
use crate::engine::EngineDocumentHandle;
use crate::engine::LintEngine;
use crate::errors::ProcessCrashed;
use crate::manager::WorkerSpawner;

/// Journal of every engine call made across the workers of one spawner.
/// Lets tests assert things like "no engine traffic after dispose".
#[derive(Clone, Debug, Default)]
pub struct OpLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl OpLog {
    fn record(&self, op: &str) {
        self.entries.lock().unwrap().push(op.to_string());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A small but real lint engine for a toy scripting language, run
/// in-process.
///
/// The language: `let <name>;` declares a variable, any other identifier is
/// a use, and `//` starts a line comment. Redeclaring a name is an error,
/// using an undeclared one is a warning; both point at the offending
/// identifier. Documents are held as ropes and mutated exclusively through
/// the change list, like the real engine across the worker boundary.
///
/// Every operation yields once before touching state, so engine calls are
/// genuine suspension points under a cooperative scheduler.
pub struct DemoEngine {
    documents: Mutex<HashMap<EngineDocumentHandle, Rope>>,
    next_handle: AtomicU64,
    ops: OpLog,
}

impl DemoEngine {
    pub fn new() -> Self {
        Self::with_ops(OpLog::default())
    }

    pub fn with_ops(ops: OpLog) -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(0),
            ops,
        }
    }

    pub fn ops(&self) -> OpLog {
        self.ops.clone()
    }
}

impl Default for DemoEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LintEngine for DemoEngine {
    async fn create_document(&self, text: &str) -> Result<EngineDocumentHandle, ProcessCrashed> {
        tokio::task::yield_now().await;
        self.ops.record("create_document");

        let handle = EngineDocumentHandle::new(self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        self.documents.lock().unwrap().insert(handle, Rope::from(text));
        Ok(handle)
    }

    async fn apply_change(
        &self,
        doc: EngineDocumentHandle,
        change: &TextChange,
    ) -> Result<(), ProcessCrashed> {
        tokio::task::yield_now().await;
        self.ops.record("apply_change");

        let mut documents = self.documents.lock().unwrap();
        let contents = documents.get_mut(&doc).expect("unknown engine document");

        let range = change.range;
        let start =
            contents.line_to_char(range.start.line as usize) + range.start.character as usize;
        let end = contents.line_to_char(range.end.line as usize) + range.end.character as usize;

        contents.remove(start..end);
        contents.insert(start, &change.text);
        Ok(())
    }

    async fn lint(&self, doc: EngineDocumentHandle) -> Result<Vec<Diagnostic>, ProcessCrashed> {
        tokio::task::yield_now().await;
        self.ops.record("lint");

        let documents = self.documents.lock().unwrap();
        let contents = documents.get(&doc).expect("unknown engine document");
        Ok(lint_text(&contents.to_string()))
    }

    async fn destroy_document(&self, doc: EngineDocumentHandle) -> Result<(), ProcessCrashed> {
        tokio::task::yield_now().await;
        self.ops.record("destroy_document");

        self.documents.lock().unwrap().remove(&doc);
        Ok(())
    }
}

/// Spawner hosting one fresh [`DemoEngine`] per worker. All workers share
/// one [`OpLog`].
#[derive(Default)]
pub struct DemoSpawner {
    ops: OpLog,
}

impl DemoSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> OpLog {
        self.ops.clone()
    }
}

#[async_trait]
impl WorkerSpawner for DemoSpawner {
    async fn spawn_worker(&self) -> anyhow::Result<Box<dyn LintEngine>> {
        Ok(Box::new(DemoEngine::with_ops(self.ops.clone())))
    }
}

fn lint_text(text: &str) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let mut declared: HashSet<String> = HashSet::new();

    let mut chars = text.chars().peekable();
    let mut line: u32 = 0;
    let mut character: u32 = 0;

    // True right after a `let` keyword: the next identifier declares.
    let mut declaring = false;

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
            character = 0;
            continue;
        }

        // Line comments hide everything up to the newline.
        if c == '/' && chars.peek() == Some(&'/') {
            while chars.peek().is_some_and(|&next| next != '\n') {
                chars.next();
            }
            continue;
        }

        if is_identifier_start(c) {
            let start = character;
            let mut name = String::new();
            name.push(c);
            character += 1;

            while chars.peek().is_some_and(|&next| is_identifier_continue(next)) {
                name.push(chars.next().unwrap());
                character += 1;
            }

            if name == "let" {
                declaring = true;
            } else if declaring {
                declaring = false;
                if !declared.insert(name.clone()) {
                    diagnostics.push(diagnostic(
                        DiagnosticSeverity::ERROR,
                        "redeclared-variable",
                        format!("redeclaration of variable: {name}"),
                        line,
                        start,
                        character,
                    ));
                }
            } else if !declared.contains(&name) {
                diagnostics.push(diagnostic(
                    DiagnosticSeverity::WARNING,
                    "undeclared-variable",
                    format!("use of undeclared variable: {name}"),
                    line,
                    start,
                    character,
                ));
            }

            continue;
        }

        character += 1;
    }

    diagnostics
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_continue(c: char) -> bool {
    is_identifier_start(c) || c.is_ascii_digit()
}

fn diagnostic(
    severity: DiagnosticSeverity,
    code: &str,
    message: String,
    line: u32,
    start: u32,
    end: u32,
) -> Diagnostic {
    let range = Range::new(Position::new(line, start), Position::new(line, end));
    let mut diagnostic = Diagnostic::new_simple(range, message);
    diagnostic.severity = Some(severity);
    diagnostic.code = Some(NumberOrString::String(String::from(code)));
    diagnostic
}
