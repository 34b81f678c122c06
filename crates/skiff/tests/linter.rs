//
// linter.rs
//
// Copyright (C) 2025 Posit Software, PBC. All rights reserved.
//
//

use std::sync::Arc;

use assert_matches::assert_matches;
use futures::future::join_all;
use skiff::fixtures::DemoSpawner;
use skiff::fixtures::FakeDocument;
use skiff::fixtures::OpLog;
use skiff::DocumentLinter;
use skiff::DocumentProcessManager;
use skiff::LinterError;
use skiff::LintableDocument;
use skiff::TextChange;
use tower_lsp::lsp_types::DiagnosticSeverity;
use tower_lsp::lsp_types::Position;
use tower_lsp::lsp_types::Range;

fn setup(text: &str) -> (Arc<FakeDocument>, Arc<DocumentProcessManager>, OpLog) {
    let _ = env_logger::builder().is_test(true).try_init();

    let document = Arc::new(FakeDocument::new(text));
    let spawner = DemoSpawner::new();
    let ops = spawner.ops();
    let manager = Arc::new(DocumentProcessManager::new(Box::new(spawner)));

    (document, manager, ops)
}

fn messages(document: &FakeDocument) -> Vec<String> {
    document
        .diagnostics()
        .unwrap_or_default()
        .iter()
        .map(|d| d.message.clone())
        .collect()
}

fn at(line: u32, character: u32) -> Position {
    Position::new(line, character)
}

#[tokio::test]
async fn test_visibility_lints_the_document() {
    let (document, manager, _ops) = setup("let x;let x;");
    let linter = DocumentLinter::new(document.clone(), manager);

    linter.editor_changed_visibility().await.unwrap();

    assert_eq!(messages(&document), vec!["redeclaration of variable: x"]);
}

#[tokio::test]
async fn test_diagnostics_carry_severities_in_source_order() {
    let (document, manager, _ops) = setup("let x;let x;\nundeclaredVariable");
    let linter = DocumentLinter::new(document.clone(), manager);

    linter.editor_changed_visibility().await.unwrap();

    let diagnostics = document.diagnostics().unwrap();
    assert_eq!(diagnostics.len(), 2);
    assert_eq!(diagnostics[0].message, "redeclaration of variable: x");
    assert_eq!(diagnostics[0].severity, Some(DiagnosticSeverity::ERROR));
    assert_eq!(
        diagnostics[1].message,
        "use of undeclared variable: undeclaredVariable"
    );
    assert_eq!(diagnostics[1].severity, Some(DiagnosticSeverity::WARNING));
}

#[tokio::test]
async fn test_opening_twice_relints_to_the_same_diagnostics() {
    let (document, manager, ops) = setup("let x;let x;");
    let linter = DocumentLinter::new(document.clone(), manager);

    linter.editor_changed_visibility().await.unwrap();
    let first = document.diagnostics();

    linter.editor_changed_visibility().await.unwrap();
    assert_eq!(document.diagnostics(), first);

    // The second call still round-trips through the engine, but reuses the
    // engine-side document.
    let ops = ops.snapshot();
    assert_eq!(ops.iter().filter(|op| op.as_str() == "lint").count(), 2);
    assert_eq!(
        ops.iter()
            .filter(|op| op.as_str() == "create_document")
            .count(),
        1
    );
}

#[tokio::test]
async fn test_unawaited_edits_apply_in_call_order() {
    let (document, manager, _ops) = setup("let x;");
    let linter = DocumentLinter::new(document.clone(), manager);

    linter.editor_changed_visibility().await.unwrap();

    // The editor applies each keystroke to its text, then notifies us, all
    // without waiting for earlier notifications to finish linting.
    let mut pending = Vec::new();
    for c in "let x; // done".chars() {
        let change = document.append(&c.to_string());
        pending.push(linter.text_changed(vec![change]));
    }

    let results = join_all(pending).await;
    assert!(results.into_iter().all(|result| result.is_ok()));

    let diagnostics = document.diagnostics().unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].message, "redeclaration of variable: x");
    assert_eq!(diagnostics[0].range, Range::new(at(0, 10), at(0, 11)));
}

#[tokio::test]
async fn test_edits_enqueued_behind_an_open_are_subsumed_by_its_snapshot() {
    let (document, manager, ops) = setup("let x;");
    let linter = DocumentLinter::new(document.clone(), manager);

    // All three edits land in the editor text before the open materializes
    // the engine document, so the snapshot already contains them.
    let first = document.append("let");
    let second = document.append(" x;");
    let third = document.append(" // done");

    let (open, r1, r2, r3) = tokio::join!(
        linter.editor_changed_visibility(),
        linter.text_changed(vec![first]),
        linter.text_changed(vec![second]),
        linter.text_changed(vec![third]),
    );
    open.unwrap();
    r1.unwrap();
    r2.unwrap();
    r3.unwrap();

    assert_eq!(messages(&document), vec!["redeclaration of variable: x"]);

    let ops = ops.snapshot();
    assert_eq!(
        ops.iter()
            .filter(|op| op.as_str() == "create_document")
            .count(),
        1
    );
    assert!(!ops.iter().any(|op| op.as_str() == "apply_change"));
}

#[tokio::test]
async fn test_engine_is_driven_by_the_change_list_alone() {
    let (document, manager, _ops) = setup("let x;");
    let linter = DocumentLinter::new(document.clone(), manager);

    linter.editor_changed_visibility().await.unwrap();

    // The document text is deliberately left stale: a linter that peeked at
    // it would lint `let x;` and report nothing.
    let changes = [
        TextChange::new(Range::new(at(0, 6), at(0, 6)), "let"),
        TextChange::new(Range::new(at(0, 9), at(0, 9)), " x;"),
        TextChange::new(Range::new(at(0, 12), at(0, 12)), " // done"),
    ];
    for change in changes {
        linter.text_changed(vec![change]).await.unwrap();
    }

    assert_eq!(document.text(), "let x;");
    assert_eq!(messages(&document), vec!["redeclaration of variable: x"]);
}

#[tokio::test]
async fn test_first_text_change_materializes_the_document() {
    let (document, manager, _ops) = setup("let x;let x;");
    let linter = DocumentLinter::new(document.clone(), manager);

    let change = document.append("\n");
    linter.text_changed(vec![change]).await.unwrap();

    assert_eq!(messages(&document), vec!["redeclaration of variable: x"]);
}

#[tokio::test]
async fn test_dispose_fails_queued_ops_and_stops_engine_traffic() {
    let (document, manager, ops) = setup("let x;let x;");
    let linter = DocumentLinter::new(document.clone(), manager);

    linter.editor_changed_visibility().await.unwrap();
    assert!(document.diagnostics().is_some());

    // The edit is enqueued but not yet started when dispose lands.
    let change = document.append(" ");
    let (edit, ()) = tokio::join!(linter.text_changed(vec![change]), linter.dispose());
    assert_matches!(edit, Err(LinterError::Disposed));

    // Diagnostics are gone, and nothing reaches the engine any more.
    assert_eq!(document.diagnostics(), None);
    let settled = ops.len();

    assert_matches!(
        linter.editor_changed_visibility().await,
        Err(LinterError::Disposed)
    );
    assert_matches!(
        linter.text_changed(Vec::new()).await,
        Err(LinterError::Disposed)
    );
    linter.dispose().await;

    assert_eq!(ops.len(), settled);
    assert_eq!(ops.snapshot().last().map(String::as_str), Some("destroy_document"));
}

#[tokio::test]
async fn test_dispose_of_an_unopened_linter_is_quiet() {
    let (document, manager, ops) = setup("let x;");
    let linter = DocumentLinter::new(document, manager);

    linter.dispose().await;
    linter.dispose().await;

    assert!(ops.is_empty());
}

#[tokio::test]
async fn test_dropping_a_linter_tears_down_in_the_background() {
    let (document, manager, ops) = setup("let x;let x;");

    {
        let linter = DocumentLinter::new(document.clone(), manager.clone());
        linter.editor_changed_visibility().await.unwrap();
    }

    for _ in 0..8 {
        tokio::task::yield_now().await;
    }

    assert_eq!(ops.snapshot().last().map(String::as_str), Some("destroy_document"));
    assert_eq!(document.diagnostics(), None);
}

struct FailingSpawner;

#[async_trait::async_trait]
impl skiff::WorkerSpawner for FailingSpawner {
    async fn spawn_worker(&self) -> anyhow::Result<Box<dyn skiff::LintEngine>> {
        anyhow::bail!("worker runtime unavailable")
    }
}

#[tokio::test]
async fn test_spawn_failure_surfaces_like_a_crash() {
    let document = Arc::new(FakeDocument::new("let x;"));
    let manager = Arc::new(DocumentProcessManager::new(Box::new(FailingSpawner)));
    let linter = DocumentLinter::new(document.clone(), manager);

    assert_matches!(
        linter.editor_changed_visibility().await,
        Err(LinterError::LintingCrashed)
    );
    assert_eq!(document.diagnostics(), None);
}
