//! Integration tests for the library pipeline.
//!
//! Documents are generated in-test, SVG rendering goes to a fake Kroki
//! server on a local port, so these run offline.

mod common;

use common::{sample_document, spawn_fake_kroki, DocxBuilder, FAKE_SVG};
use ebd_toolchain::{
    convert, inspect, ConversionProgressCallback, OutputFormat, RunReport, Stage, ToolchainConfig,
};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn config(formats: &[OutputFormat], kroki_port: u16) -> ToolchainConfig {
    ToolchainConfig::builder()
        .formats(formats.iter().copied())
        .kroki_host("127.0.0.1")
        .kroki_port(kroki_port)
        .build()
        .unwrap()
}

fn file_names(dir: &Path) -> BTreeSet<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn failure_kinds(report: &RunReport) -> Vec<&str> {
    report.failures.iter().map(|f| f.kind.as_str()).collect()
}

// ── Conversion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn all_formats_are_written_per_tree() {
    let kroki = spawn_fake_kroki(200, FAKE_SVG).await;
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ebd.docx");
    sample_document().write_to(&input);
    let out = dir.path().join("out");

    let report = convert(&input, &out, &config(&OutputFormat::ALL, kroki.port))
        .await
        .unwrap();

    assert!(report.is_success(), "failures: {:?}", report.failures);
    assert_eq!(report.documents, 1);
    assert_eq!(report.trees, 3);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].ebd_key, "E_0002");
    assert_eq!(report.artifacts.len(), 8);
    assert_eq!(
        file_names(&out),
        names(&[
            "E_0001.dot",
            "E_0001.json",
            "E_0001.puml",
            "E_0001.svg",
            "E_0003.dot",
            "E_0003.json",
            "E_0003.puml",
            "E_0003.svg",
        ])
    );

    assert_eq!(std::fs::read_to_string(out.join("E_0001.svg")).unwrap(), FAKE_SVG);
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("E_0001.json")).unwrap()).unwrap();
    assert_eq!(json["metadata"]["ebd_code"], "E_0001");
    assert_eq!(json["metadata"]["ebd_name"], "Anmeldung prüfen");
    assert_eq!(json["metadata"]["role"], "NB");
    assert_eq!(json["rows"].as_array().unwrap().len(), 2);

    // the SVG is rendered from the DOT source, posted as plain text
    let requests = kroki.requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.path, "/graphviz/svg");
        assert_eq!(request.content_type.as_deref(), Some("text/plain"));
        assert!(request.body.starts_with("digraph D {"));
    }
    let dot = std::fs::read_to_string(out.join("E_0001.dot")).unwrap();
    assert!(requests.iter().any(|r| r.body == dot));
}

#[tokio::test]
async fn unreachable_kroki_only_loses_svg() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ebd.docx");
    sample_document().write_to(&input);
    let out = dir.path().join("out");

    // nothing listens on port 1
    let report = convert(
        &input,
        &out,
        &config(&[OutputFormat::Json, OutputFormat::Dot, OutputFormat::Svg], 1),
    )
    .await
    .unwrap();

    assert!(!report.is_success());
    assert_eq!(failure_kinds(&report), vec!["RenderServiceError", "RenderServiceError"]);
    for failure in &report.failures {
        assert_eq!(failure.stage, Stage::Render);
        assert_eq!(failure.format, Some(OutputFormat::Svg));
    }
    assert_eq!(
        file_names(&out),
        names(&["E_0001.dot", "E_0001.json", "E_0003.dot", "E_0003.json"])
    );
}

#[tokio::test]
async fn kroki_error_status_is_reported_with_body() {
    let kroki = spawn_fake_kroki(400, "Error 400: syntax error in line 3").await;
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ebd.docx");
    DocxBuilder::new()
        .two_step_ebd("E_0001", "Anmeldung prüfen")
        .write_to(&input);
    let out = dir.path().join("out");

    let report = convert(&input, &out, &config(&[OutputFormat::Svg], kroki.port))
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.kind, "RenderServiceError");
    assert!(failure.message.contains("HTTP 400"), "{}", failure.message);
    assert!(failure.message.contains("syntax error"), "{}", failure.message);
    assert!(!out.join("E_0001.svg").exists());
}

#[tokio::test]
async fn broken_tree_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ebd.docx");
    DocxBuilder::new()
        .two_step_ebd("E_0001", "Anmeldung prüfen")
        .dangling_ebd("E_0002")
        .two_step_ebd("E_0003", "Abmeldung prüfen")
        .write_to(&input);
    let out = dir.path().join("out");

    let report = convert(
        &input,
        &out,
        &config(&[OutputFormat::Json, OutputFormat::Dot, OutputFormat::Puml], 1),
    )
    .await
    .unwrap();

    assert_eq!(report.trees, 3);
    assert_eq!(report.failed_trees(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.ebd_key.as_deref(), Some("E_0002"));
    assert_eq!(failure.stage, Stage::GraphBuild);
    assert_eq!(failure.kind, "DanglingReference");

    // JSON comes from the table and is written before the graph is built
    assert_eq!(
        file_names(&out),
        names(&[
            "E_0001.dot",
            "E_0001.json",
            "E_0001.puml",
            "E_0002.json",
            "E_0003.dot",
            "E_0003.json",
            "E_0003.puml",
        ])
    );
}

#[tokio::test]
async fn malformed_table_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ebd.docx");
    DocxBuilder::new()
        .two_step_ebd("E_0001", "Anmeldung prüfen")
        .single_answer_ebd("E_0002")
        .two_step_ebd("E_0003", "Abmeldung prüfen")
        .write_to(&input);
    let out = dir.path().join("out");

    let report = convert(&input, &out, &config(&[OutputFormat::Json, OutputFormat::Dot], 1))
        .await
        .unwrap();

    assert_eq!(report.trees, 3);
    assert_eq!(report.failed_trees(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.ebd_key.as_deref(), Some("E_0002"));
    assert_eq!(failure.stage, Stage::Extract);
    assert_eq!(failure.kind, "MalformedTable");
    assert_eq!(
        file_names(&out),
        names(&["E_0001.dot", "E_0001.json", "E_0003.dot", "E_0003.json"])
    );
}

#[tokio::test]
async fn failed_write_only_loses_that_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ebd.docx");
    sample_document().write_to(&input);
    let out = dir.path().join("out");
    // a directory where E_0001.dot should go
    std::fs::create_dir_all(out.join("E_0001.dot")).unwrap();

    let report = convert(
        &input,
        &out,
        &config(&[OutputFormat::Json, OutputFormat::Dot, OutputFormat::Puml], 1),
    )
    .await
    .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed_trees(), 1);
    assert_eq!(failure_kinds(&report), vec!["WriteError"]);
    let failure = &report.failures[0];
    assert_eq!(failure.ebd_key.as_deref(), Some("E_0001"));
    assert_eq!(failure.stage, Stage::Write);
    assert_eq!(failure.format, Some(OutputFormat::Dot));

    assert_eq!(report.artifacts.len(), 5);
    assert!(out.join("E_0001.dot").is_dir());
    for name in ["E_0001.json", "E_0001.puml", "E_0003.json", "E_0003.dot", "E_0003.puml"] {
        assert!(out.join(name).is_file(), "{name} missing");
    }
}

#[tokio::test]
async fn rerun_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ebd.docx");
    sample_document().write_to(&input);
    let out = dir.path().join("out");
    let cfg = config(&[OutputFormat::Json, OutputFormat::Dot, OutputFormat::Puml], 1);

    convert(&input, &out, &cfg).await.unwrap();
    let first: Vec<(String, Vec<u8>)> = file_names(&out)
        .into_iter()
        .map(|n| {
            let bytes = std::fs::read(out.join(&n)).unwrap();
            (n, bytes)
        })
        .collect();

    let report = convert(&input, &out, &cfg).await.unwrap();
    assert!(report.is_success());
    let second: Vec<(String, Vec<u8>)> = file_names(&out)
        .into_iter()
        .map(|n| {
            let bytes = std::fs::read(out.join(&n)).unwrap();
            (n, bytes)
        })
        .collect();

    assert_eq!(first, second);
    assert_eq!(first.len(), 6);
}

#[tokio::test]
async fn document_without_trees_fails_without_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("empty.docx");
    DocxBuilder::new()
        .heading(1, "Einleitung")
        .paragraph("Dieses Dokument enthält keine Entscheidungsbäume.")
        .write_to(&input);
    let out = dir.path().join("out");

    let report = convert(&input, &out, &config(&[OutputFormat::Json], 1))
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.trees, 0);
    assert!(report.artifacts.is_empty());
    assert_eq!(failure_kinds(&report), vec!["NoDecisionTrees"]);
    assert_eq!(report.failures[0].ebd_key, None);
    assert!(file_names(&out).is_empty());
}

#[tokio::test]
async fn directory_input_converts_every_document() {
    let dir = tempfile::tempdir().unwrap();
    let docs = dir.path().join("docs");
    std::fs::create_dir(&docs).unwrap();
    DocxBuilder::new()
        .two_step_ebd("E_0101", "Erstes")
        .write_to(&docs.join("a.docx"));
    DocxBuilder::new()
        .two_step_ebd("E_0201", "Zweites")
        .write_to(&docs.join("b.docx"));
    std::fs::write(docs.join("~$a.docx"), b"lock").unwrap();
    // a broken document fails on its own
    std::fs::write(docs.join("c.docx"), b"PK\x03\x04 truncated").unwrap();
    let out = dir.path().join("out");

    let report = convert(&docs, &out, &config(&[OutputFormat::Json], 1))
        .await
        .unwrap();

    assert_eq!(report.documents, 3);
    assert_eq!(report.trees, 2);
    assert_eq!(failure_kinds(&report), vec!["Unreadable"]);
    assert_eq!(report.failures[0].document, "c.docx");
    assert_eq!(file_names(&out), names(&["E_0101.json", "E_0201.json"]));
}

#[tokio::test]
async fn non_docx_input_fails_as_that_document() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ebd.pdf");
    std::fs::write(&input, b"%PDF-1.7").unwrap();
    let out = dir.path().join("out");

    let report = convert(&input, &out, &config(&[OutputFormat::Json], 1))
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.documents, 1);
    assert!(report.artifacts.is_empty());
    assert_eq!(failure_kinds(&report), vec!["Unreadable"]);
    assert_eq!(report.failures[0].document, "ebd.pdf");
    assert_eq!(report.failures[0].stage, Stage::Extract);
    assert!(file_names(&out).is_empty());
}

// ── Progress callback ────────────────────────────────────────────────────────

#[derive(Default)]
struct Counting {
    documents: AtomicUsize,
    started: AtomicUsize,
    completed: AtomicUsize,
    skipped: AtomicUsize,
    errors: AtomicUsize,
    runs: AtomicUsize,
}

impl ConversionProgressCallback for Counting {
    fn on_document_start(&self, _document: &str, _total_trees: usize) {
        self.documents.fetch_add(1, Ordering::SeqCst);
    }
    fn on_tree_start(&self, _ebd_key: &str, _index: usize, _total: usize) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_tree_complete(&self, _ebd_key: &str, _artifacts: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_tree_skipped(&self, _ebd_key: &str, _reason: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }
    fn on_tree_error(&self, _ebd_key: &str, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_run_complete(&self, total_trees: usize, failed: usize) {
        assert_eq!((total_trees, failed), (4, 1));
        self.runs.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn progress_callback_sees_every_tree() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ebd.docx");
    sample_document().dangling_ebd("E_0004").write_to(&input);

    let counting = Arc::new(Counting::default());
    let cfg = ToolchainConfig::builder()
        .format(OutputFormat::Dot)
        .progress_callback(counting.clone())
        .build()
        .unwrap();
    convert(&input, dir.path().join("out"), &cfg).await.unwrap();

    assert_eq!(counting.documents.load(Ordering::SeqCst), 1);
    assert_eq!(counting.started.load(Ordering::SeqCst), 4);
    assert_eq!(counting.completed.load(Ordering::SeqCst), 2);
    assert_eq!(counting.skipped.load(Ordering::SeqCst), 1);
    assert_eq!(counting.errors.load(Ordering::SeqCst), 1);
    assert_eq!(counting.runs.load(Ordering::SeqCst), 1);
}

// ── Inspect ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn inspect_lists_keys_with_chapter_position() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ebd.docx");
    sample_document().write_to(&input);

    let inventory = inspect(&input).await.unwrap();
    assert_eq!(inventory.len(), 1);
    let doc = &inventory[0];
    assert_eq!(doc.document, "ebd.docx");
    assert!(doc.error.is_none());

    let keys: Vec<_> = doc.keys.iter().map(|k| k.key.as_str()).collect();
    assert_eq!(keys, vec!["E_0001", "E_0002", "E_0003"]);
    assert_eq!(doc.keys[2].title, "Abmeldung prüfen");
    assert_eq!(doc.keys[2].kapitel.sub_chapter(), "1.1.3: Lieferbeginn");
}
