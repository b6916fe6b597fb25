//! CLI Integration Tests
//!
//! These tests run the `eatadaki` binary against a throwaway data directory
//! and config file.
//!
//! ```
//! cargo test --package eatadaki-cli --test cli_integration
//! ```

use std::path::PathBuf;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

/// A data directory and config file that live as long as the test.
struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    fn data_dir(&self) -> PathBuf {
        self.dir.path().join("data")
    }

    fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.toml")
    }

    /// Run eatadaki with the sandbox paths and return its output.
    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_eatadaki"))
            .args(args)
            .arg("--data-dir")
            .arg(self.data_dir())
            .arg("--config")
            .arg(self.config_path())
            .env_remove("RUST_LOG")
            .env_remove("EATADAKI_DATA_DIR")
            .env_remove("EATADAKI_CONFIG")
            .output()
            .expect("Failed to run eatadaki binary")
    }

    /// Run a command that must succeed and parse its JSON output.
    fn json(&self, args: &[&str]) -> Value {
        let mut args = args.to_vec();
        args.extend(["--format", "json"]);
        let output = self.run(&args);
        assert!(
            output.status.success(),
            "{args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// =============================================================================
// Help
// =============================================================================

#[test]
fn test_help_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_eatadaki"))
        .arg("--help")
        .output()
        .expect("Failed to run eatadaki binary");

    assert!(output.status.success(), "Help should succeed");
    let text = stdout(&output);
    for command in ["spot", "experience", "user", "settings", "config"] {
        assert!(text.contains(command), "Help should list {command}");
    }
}

// =============================================================================
// Spots
// =============================================================================

#[test]
fn test_spot_add_then_list() {
    let sandbox = Sandbox::new();

    let added = sandbox.json(&["spot", "add", "Tsuta", "--at", "35.733,139.714"]);
    assert_eq!(added["name"], "Tsuta");
    assert_eq!(added["reason"], "manual");
    sandbox.json(&["spot", "add", "Afuri", "--at", "35.648,139.708"]);

    let list = sandbox.json(&["spot", "list"]);
    let names: Vec<&str> = list
        .as_array()
        .expect("list should be an array")
        .iter()
        .map(|s| s["name"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(names, ["Afuri", "Tsuta"]);

    let filtered = sandbox.json(&["spot", "list", "--search", "TSU"]);
    assert_eq!(filtered.as_array().map(Vec::len), Some(1));
}

#[test]
fn test_spot_list_by_distance() {
    let sandbox = Sandbox::new();
    sandbox.json(&["spot", "add", "Far", "--at", "10,10"]);
    sandbox.json(&["spot", "add", "Near", "--at", "0.1,0.1"]);

    let list = sandbox.json(&["spot", "list", "--sort", "distance", "--from", "0,0"]);
    assert_eq!(list[0]["name"], "Near");
    assert!(list[0]["distance_m"].as_f64().is_some());

    let output = sandbox.run(&["spot", "list", "--sort", "distance"]);
    assert!(
        !output.status.success(),
        "Distance sort without a reference point should fail"
    );
}

#[test]
fn test_spot_near_uses_box() {
    let sandbox = Sandbox::new();
    sandbox.json(&["spot", "add", "Inside", "--at", "35.0,139.0"]);
    sandbox.json(&["spot", "add", "Outside", "--at", "36.0,139.0"]);

    let near = sandbox.json(&["spot", "near", "--at", "35.005,139.005", "--span", "0.01"]);
    let names: Vec<&str> = near
        .as_array()
        .expect("near should be an array")
        .iter()
        .map(|s| s["name"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(names, ["Inside"]);
}

#[test]
fn test_spot_duplicate_map_provider_id_fails() {
    let sandbox = Sandbox::new();
    sandbox.json(&["spot", "add", "One", "--at", "1,1", "--map-provider-id", "mp-1"]);

    let output = sandbox.run(&["spot", "add", "Two", "--at", "2,2", "--map-provider-id", "mp-1"]);
    assert!(!output.status.success());
}

#[test]
fn test_spot_search_caches_results() {
    let sandbox = Sandbox::new();
    let results = sandbox.dir.path().join("results.json");
    std::fs::write(
        &results,
        r#"[
            {"name": "Ichiran", "coordinate": {"latitude": 35.69, "longitude": 139.70}, "map_provider_id": "mp-ichiran"},
            {"name": "Sushi Dai", "coordinate": {"latitude": 35.66, "longitude": 139.77}, "map_provider_id": "mp-dai"}
        ]"#,
    )
    .expect("Failed to write results");
    let results = results.to_string_lossy().into_owned();

    let found = sandbox.json(&["spot", "search", "ichi", "--from", &results]);
    assert_eq!(found[0]["name"], "Ichiran");
    assert_eq!(found[0]["reason"], "search_result");

    // Searching again upserts by map provider id instead of duplicating.
    sandbox.json(&["spot", "search", "ichi", "--from", &results]);
    let list = sandbox.json(&["spot", "list"]);
    assert_eq!(list.as_array().map(Vec::len), Some(1));

    let shown = sandbox.json(&["spot", "show", "--map-provider-id", "mp-ichiran"]);
    assert_eq!(shown["id"], found[0]["id"]);
}

// =============================================================================
// Experiences
// =============================================================================

#[test]
fn test_experience_with_rating() {
    let sandbox = Sandbox::new();
    let spot = sandbox.json(&["spot", "add", "Fuunji", "--at", "35.687,139.696"]);
    let spot_id = spot["id"].as_str().expect("spot id").to_string();

    let details = sandbox.json(&[
        "experience", "add", "--spot", &spot_id, "Tsukemen", "-r", "9", "--notes", "rich",
    ]);
    let id = details["experience"]["id"].as_str().expect("experience id").to_string();
    assert_eq!(details["ratings"][0]["rating"], 9);

    sandbox.json(&["experience", "rate", &id, "7"]);
    let shown = sandbox.json(&["experience", "show", &id]);
    assert_eq!(shown["ratings"].as_array().map(Vec::len), Some(2));
    assert_eq!(shown["spot"]["name"], "Fuunji");

    let list = sandbox.json(&["experience", "list"]);
    assert_eq!(list[0]["experience"]["name"], "Tsukemen");

    // Deleting the spot removes its experiences.
    let output = sandbox.run(&["spot", "delete", &spot_id]);
    assert!(output.status.success());
    let list = sandbox.json(&["experience", "list"]);
    assert_eq!(list.as_array().map(Vec::len), Some(0));
}

#[test]
fn test_invalid_rating_is_rejected() {
    let sandbox = Sandbox::new();
    let spot = sandbox.json(&["spot", "add", "Spot", "--at", "0,0"]);
    let spot_id = spot["id"].as_str().expect("spot id").to_string();

    let output = sandbox.run(&["experience", "add", "--spot", &spot_id, "Bad", "-r", "11"]);
    assert!(!output.status.success());

    let list = sandbox.json(&["experience", "list"]);
    assert_eq!(list.as_array().map(Vec::len), Some(0));
}

#[test]
fn test_experience_for_missing_spot_fails() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&[
        "experience",
        "add",
        "--spot",
        "00000000-0000-4000-8000-000000000000",
        "Ghost",
    ]);
    assert!(!output.status.success());
}

// =============================================================================
// User and settings
// =============================================================================

#[test]
fn test_user_login_and_logout() {
    let sandbox = Sandbox::new();
    assert_eq!(sandbox.json(&["user", "show"]), Value::Null);

    sandbox.json(&["user", "login", "first@example.com"]);
    let user = sandbox.json(&["user", "login", "second@example.com"]);
    assert_eq!(user["email"], "second@example.com");
    assert_eq!(sandbox.json(&["user", "show"])["email"], "second@example.com");

    assert!(sandbox.run(&["user", "logout"]).status.success());
    assert_eq!(sandbox.json(&["user", "show"]), Value::Null);
}

#[test]
fn test_location_setting() {
    let sandbox = Sandbox::new();
    let off = sandbox.json(&["settings", "location"]);
    assert_eq!(off["opted_into_location_services"], false);

    let on = sandbox.json(&["settings", "location", "on"]);
    assert_eq!(on["opted_into_location_services"], true);

    let output = sandbox.run(&["settings", "show"]);
    assert!(stdout(&output).contains("opted_into_location_services = true"));
}

// =============================================================================
// Config
// =============================================================================

#[test]
fn test_config_init_and_path() {
    let sandbox = Sandbox::new();

    let output = sandbox.run(&["config", "path"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        sandbox.config_path().display().to_string()
    );

    assert!(sandbox.run(&["config", "init"]).status.success());
    assert!(sandbox.config_path().exists());
    assert!(!sandbox.run(&["config", "init"]).status.success());
    assert!(sandbox.run(&["config", "init", "--force"]).status.success());
}

#[test]
fn test_config_home_drives_distance_sort() {
    let sandbox = Sandbox::new();
    std::fs::write(
        sandbox.config_path(),
        "format = \"json\"\n\n[home]\nlatitude = 0.0\nlongitude = 0.0\n",
    )
    .expect("Failed to write config");

    sandbox.run(&["spot", "add", "Far", "--at", "5,5"]);
    sandbox.run(&["spot", "add", "Near", "--at", "1,1"]);

    let output = sandbox.run(&["spot", "list", "--sort", "distance"]);
    assert!(output.status.success());
    let list: Value = serde_json::from_slice(&output.stdout).expect("config format is json");
    assert_eq!(list[0]["name"], "Near");
}
