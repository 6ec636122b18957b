//! Tests that drive the `polrag` binary.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn polrag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("polrag");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    fs::create_dir_all(root.join("config")).unwrap();
    let uploads = root.join("uploads");
    fs::create_dir_all(&uploads).unwrap();
    fs::write(uploads.join("handbook.pdf"), common::handbook_pdf()).unwrap();

    // Embeddings stay disabled so no test touches the network; Ollama
    // generation needs no API key to construct.
    let config_content = format!(
        r#"[db]
path = "{root}/data/polrag.sqlite"

[index]
collection = "cli_test"

[embedding]
provider = "disabled"

[generation]
provider = "ollama"
model = "llama3"
url = "http://127.0.0.1:9"

[ingest]
documents_dir = "{root}/uploads"
"#,
        root = root.display()
    );

    let config_path = root.join("config/polrag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_polrag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = polrag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run polrag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_polrag(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/polrag.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, first) = run_polrag(&config_path, &["init"]);
    let (_, stderr, second) = run_polrag(&config_path, &["init"]);
    assert!(first && second, "second init failed: {}", stderr);
}

#[test]
fn test_stats_on_empty_index() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_polrag(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Collection: cli_test"));
    assert!(stdout.contains("Total chunks: 0"));
}

#[test]
fn test_ingest_reports_per_file_failure_and_continues() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("uploads/missing.pdf");
    let handbook = tmp.path().join("uploads/handbook.pdf");

    let (stdout, stderr, success) = run_polrag(
        &config_path,
        &["ingest", missing.to_str().unwrap(), handbook.to_str().unwrap()],
    );
    // Per-file failures do not fail the command.
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("missing.pdf: FAILED"));
    // With embeddings disabled the readable file fails at the embedding step.
    assert!(stdout.contains("handbook.pdf: FAILED"));
    assert!(stdout.contains("disabled"));
    assert!(stdout.contains("files failed: 2"));
    assert!(stdout.contains("collection cli_test: 0 chunks total"));
}

#[test]
fn test_ingest_defaults_to_documents_dir() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_polrag(&config_path, &["ingest", "--clear"]);
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("handbook.pdf"));
}

#[test]
fn test_ask_fails_when_embeddings_disabled() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_polrag(&config_path, &["ask", "How much annual leave?"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr: {}", stderr);
}

#[test]
fn test_clear() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_polrag(&config_path, &["clear"]);
    assert!(success, "clear failed: {}", stderr);
    assert!(stdout.contains("Index cleared."));
}

#[test]
fn test_invalid_config_rejected() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(
        &bad,
        "[db]\npath = \"x.sqlite\"\n[chunking]\nchunk_size = 100\nchunk_overlap = 150\n",
    )
    .unwrap();

    let (_, stderr, success) = run_polrag(&bad, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"));
}
