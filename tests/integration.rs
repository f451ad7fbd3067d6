use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

use threatload::backend_sqlite::SqliteBackend;
use threatload_core::enrich::Sentiment;

fn threatload_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("threatload");
    path
}

const SCENARIO_CSV: &str = "text,label,timestamp\n\
I love dogs,pos,t1\n\
bomb attack kill,neg,t2\n\
,neu,t3\n";

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let inputs = root.join("inputs");
    fs::create_dir_all(&inputs).unwrap();
    fs::write(inputs.join("weapons.txt"), "bomb\nknife\n").unwrap();
    fs::write(inputs.join("texts.csv"), SCENARIO_CSV).unwrap();

    let config_content = format!(
        r#"[backend]
kind = "sqlite"

[sqlite]
path = "{root}/data/threatload.sqlite"

[index]
documents = "texts"
status = "status"

[ingest]
weapons_path = "{root}/inputs/weapons.txt"
csv_path = "{root}/inputs/texts.csv"
batch_size = 2
"#,
        root = root.display()
    );

    let config_path = config_dir.join("threatload.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_threatload(config_path: &Path, args: &[&str]) -> Output {
    Command::new(threatload_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run threatload binary")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn stored_documents(root: &Path) -> Vec<threatload_core::models::IndexedDocument> {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let backend = SqliteBackend::open(&root.join("data/threatload.sqlite"))
            .await
            .unwrap();
        backend.documents("texts").await.unwrap()
    })
}

#[test]
fn test_init_is_idempotent() {
    let (tmp, config) = setup_test_env();

    for _ in 0..2 {
        let output = run_threatload(&config, &["init"]);
        assert!(output.status.success(), "init failed: {}", stderr_of(&output));
        let stdout = stdout_of(&output);
        assert!(stdout.contains("Collections 'texts' and 'status' ready."));
    }
    assert!(tmp.path().join("data/threatload.sqlite").exists());
}

#[test]
fn test_status_before_any_load() {
    let (_tmp, config) = setup_test_env();

    let output = run_threatload(&config, &["status"]);
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("status: not recorded"));
}

#[test]
fn test_load_scenario_with_pipeline() {
    let (tmp, config) = setup_test_env();

    let output = run_threatload(&config, &["load", "--progress", "off"]);
    assert!(output.status.success(), "load failed: {}", stderr_of(&output));

    let stdout = stdout_of(&output);
    assert!(stdout.contains("rows: 3"));
    assert!(stdout.contains("batches: 2"));
    assert!(stdout.contains("indexed: 3"));
    assert!(stdout.contains("rejected: 0"));
    assert!(stdout.contains("enrichment: pipeline"));
    assert!(stdout.contains("status done: true"));

    let docs = stored_documents(tmp.path());
    assert_eq!(docs.len(), 3);
    let sentiments: Vec<Sentiment> = docs
        .iter()
        .map(|d| d.enrichment.as_ref().unwrap().sentiment)
        .collect();
    assert_eq!(
        sentiments,
        vec![Sentiment::Positive, Sentiment::Negative, Sentiment::Neutral]
    );
    assert_eq!(docs[1].enrichment.as_ref().unwrap().weapons_found, vec!["bomb"]);
    assert!(docs[2].enrichment.as_ref().unwrap().weapons_found.is_empty());
    assert_eq!(docs[2].document.label.as_deref(), Some("neu"));

    let output = run_threatload(&config, &["status"]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("done: true"));
    assert!(stdout.contains("updated: "));
}

#[test]
fn test_load_local_mode() {
    let (tmp, config) = setup_test_env();

    let output = run_threatload(&config, &["load", "--mode", "local", "--batch-size", "500"]);
    assert!(output.status.success(), "load failed: {}", stderr_of(&output));

    let stdout = stdout_of(&output);
    assert!(stdout.contains("batches: 1"));
    assert!(stdout.contains("enrichment: local"));

    let docs = stored_documents(tmp.path());
    assert_eq!(docs[0].enrichment.as_ref().unwrap().sentiment, Sentiment::Positive);
    assert_eq!(docs[1].enrichment.as_ref().unwrap().weapons_found, vec!["bomb"]);
}

#[test]
fn test_load_dry_run_touches_nothing() {
    let (tmp, config) = setup_test_env();

    let output = run_threatload(&config, &["load", "--dry-run"]);
    assert!(output.status.success());

    let stdout = stdout_of(&output);
    assert!(stdout.contains("(dry-run)"));
    assert!(stdout.contains("rows found: 3"));
    assert!(stdout.contains("batches: 2"));
    assert!(stdout.contains("weapon terms: 2"));
    assert!(!tmp.path().join("data/threatload.sqlite").exists());
}

#[test]
fn test_load_missing_csv_fails_without_status() {
    let (tmp, config) = setup_test_env();
    let missing = tmp.path().join("inputs/nope.csv");

    let output = run_threatload(&config, &["load", "--csv", missing.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("Failed to read input"));

    let output = run_threatload(&config, &["status"]);
    assert!(stdout_of(&output).contains("status: not recorded"));
}

#[test]
fn test_load_missing_weapons_file_fails() {
    let (tmp, config) = setup_test_env();
    fs::remove_file(tmp.path().join("inputs/weapons.txt")).unwrap();

    let output = run_threatload(&config, &["load"]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("Failed to load weapon list"));
}

#[test]
fn test_load_tolerates_missing_columns() {
    let (tmp, config) = setup_test_env();
    let csv = tmp.path().join("inputs/text_only.csv");
    fs::write(&csv, "text\nsupport the good cause\nshoot\n").unwrap();

    let output = run_threatload(&config, &["load", "--csv", csv.to_str().unwrap()]);
    assert!(output.status.success(), "load failed: {}", stderr_of(&output));
    assert!(stdout_of(&output).contains("indexed: 2"));

    let docs = stored_documents(tmp.path());
    assert_eq!(docs.len(), 2);
    assert!(docs[0].document.label.is_none());
    assert!(docs[0].document.timestamp.is_none());
    assert_eq!(docs[1].enrichment.as_ref().unwrap().sentiment, Sentiment::Negative);
}

#[test]
fn test_enrich_prints_json() {
    let (_tmp, config) = setup_test_env();

    let output = run_threatload(&config, &["enrich", "the bomb will destroy a knife"]);
    assert!(output.status.success(), "enrich failed: {}", stderr_of(&output));

    let value: serde_json::Value = serde_json::from_str(&stdout_of(&output)).unwrap();
    assert_eq!(value["sentiment"], "negative");
    assert_eq!(value["weapons"], serde_json::json!(["bomb", "knife"]));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (tmp, _config) = setup_test_env();
    let bad = tmp.path().join("config/bad.toml");
    fs::write(
        &bad,
        "[backend]\nkind = \"sqlite\"\n\n[ingest]\nweapons_path = \"w.txt\"\n",
    )
    .unwrap();

    let output = run_threatload(&bad, &["status"]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("[sqlite] section required"));
}
