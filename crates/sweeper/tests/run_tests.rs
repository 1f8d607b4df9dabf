//! End-to-end tests for the sweeper binary

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const INVENTORY: &str = r#"[
    {"kind": "instance", "id": "i-1", "name": "prod-api", "created": "2023-01-01T00:00:00Z",
     "provider": "AWS", "state": "running"},
    {"kind": "instance", "id": "i-2", "name": "scratch", "created": "2023-01-01T00:00:00Z",
     "provider": "AWS", "state": "running"},
    {"kind": "instance", "id": "i-3", "name": "owned", "created": "2023-01-01T00:00:00Z",
     "provider": "AWS", "state": "running", "tags": {"Owner": "alice"}},
    {"kind": "stack", "id": "s-1", "name": "gcp-stack", "created": "2023-01-01T00:00:00Z",
     "provider": "GCP"}
]"#;

const RULES: &str = r#"
excludeInstance:
  aws:
    names: ["prod-"]
"#;

/// Workspace with an inventory, a rules document and a runner config
fn workspace(extra_config: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("inventory.json"), INVENTORY).unwrap();
    fs::write(dir.path().join("rules.yaml"), RULES).unwrap();

    let config = format!(
        "inventory_path = {:?}\nfilter_config_path = {:?}\n{}",
        dir.path().join("inventory.json"),
        dir.path().join("rules.yaml"),
        extra_config
    );
    fs::write(dir.path().join("sweeper.toml"), config).unwrap();
    dir
}

fn run_sweeper(dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sweeper"))
        .arg("--config")
        .arg(dir.join("sweeper.toml"))
        .env_remove("SWEEPER_CONFIG")
        .env_remove("HTTPURL_PATH")
        .env_remove("HTTPURL_PORT")
        .env_remove("GOOGLE_PROJECT_ID")
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute sweeper")
}

#[test]
fn test_json_action_prints_selected_items() {
    let dir = workspace("filters = [\"ownerless\"]\naction = \"json\"\n");
    let output = run_sweeper(dir.path());

    assert!(
        output.status.success(),
        "Run should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let items: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = items.iter().filter_map(|i| i["name"].as_str()).collect();
    assert_eq!(names, vec!["scratch", "gcp-stack"], "Rules and owner tag should drop items");
}

#[test]
fn test_provider_restricts_inventory() {
    let dir = workspace("filters = [\"ownerless\"]\naction = \"json\"\nprovider = \"GCP\"\n");
    let output = run_sweeper(dir.path());

    assert!(output.status.success(), "Run should succeed");
    let items: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["kind"], "stack");
}

#[test]
fn test_unknown_filter_fails() {
    let dir = workspace("filters = [\"bogus\"]\n");
    let output = run_sweeper(dir.path());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success(), "Unknown filter should fail the run");
    assert!(stderr.contains("unknown filter: bogus"), "Should name the filter: {}", stderr);
}

#[test]
fn test_httpurl_without_path_fails() {
    let dir = workspace("filters = [\"httpurl\"]\n");
    let output = run_sweeper(dir.path());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success(), "Missing HTTPURL_PATH should fail the run");
    assert!(stderr.contains("HTTPURL_PATH"), "Should name the variable: {}", stderr);
}

#[test]
fn test_metrics_textfile_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let metrics = dir.path().join("sweeper.prom");
    let workspace = workspace(&format!(
        "filters = [\"longrunning\"]\nmetrics_file = {:?}\n",
        metrics
    ));

    let output = run_sweeper(workspace.path());
    assert!(output.status.success(), "Run should succeed");

    let rendered = fs::read_to_string(&metrics).unwrap();
    assert!(rendered.contains("sweeper_items_evaluated_total{filter=\"longrunning\"} 4"));
    assert!(rendered.contains("sweeper_items_selected_total{filter=\"longrunning\"} 3"));
}
