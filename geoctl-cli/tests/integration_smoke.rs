//! Smoke tests to verify command wiring

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `geoctl` run from `dir` with no database settings inherited
fn geoctl(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("geoctl").unwrap();
    cmd.current_dir(dir.path());
    for var in [
        "MONGO_URI",
        "CLOUD_MONGO",
        "MONGO_USER",
        "MONGO_PASSWD",
        "MONGO_HOST",
        "DB_NAME",
        "DB_TIMEOUT_SECS",
        "CITY_STATE_FALLBACK",
        "GEOCTL_BIND",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn seed_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    let bkup = dir.path().join("data").join("bkup");
    std::fs::create_dir_all(&bkup).unwrap();
    std::fs::write(
        bkup.join("countries.json"),
        r#"[{"code": "US", "name": "United States"}, {"code": "CA", "name": "Canada"}]"#,
    )
    .unwrap();
    std::fs::write(
        bkup.join("states.json"),
        r#"{"state_code": "IL", "country_code": "US", "name": "Illinois"}"#,
    )
    .unwrap();
    dir
}

// === Help ===

#[test]
fn test_top_level_help() {
    let dir = TempDir::new().unwrap();
    geoctl(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("seed"))
        .stdout(predicate::str::contains("ping"));
}

#[test]
fn test_serve_help() {
    let dir = TempDir::new().unwrap();
    geoctl(&dir)
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Address to bind to"))
        .stdout(predicate::str::contains("--in-memory"));
}

#[test]
fn test_seed_help() {
    let dir = TempDir::new().unwrap();
    geoctl(&dir)
        .args(["seed", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("data/bkup"));
}

// === Seed ===

#[test]
fn test_seed_dry_run_counts_documents() {
    let dir = seed_dir();
    geoctl(&dir)
        .args(["seed", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("countries: 2 documents"))
        .stdout(predicate::str::contains("states: 1 documents"))
        .stdout(predicate::str::contains("cities: no file, skipped"))
        .stdout(predicate::str::contains("Dry run: 3 documents found"));
}

#[test]
fn test_seed_in_memory_validates_files() {
    let dir = seed_dir();
    geoctl(&dir)
        .args(["seed", "--in-memory"])
        .assert()
        .success()
        .stdout(predicate::str::contains("countries: 2 inserted, 0 already present"))
        .stdout(predicate::str::contains("Total: 3 inserted"));
}

#[test]
fn test_seed_in_memory_json_report() {
    let dir = seed_dir();
    let output = geoctl(&dir)
        .args(["seed", "--in-memory", "--json", "--only", "countries"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["dry_run"], false);
    assert_eq!(report["stems"][0]["stem"], "countries");
    assert_eq!(report["stems"][0]["inserted"], 2);
}

#[test]
fn test_seed_rejects_unknown_stem() {
    let dir = seed_dir();
    geoctl(&dir)
        .args(["seed", "--dry-run", "--only", "planets"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown seed stem"));
}

#[test]
fn test_seed_rejects_orphan_state() {
    let dir = seed_dir();
    let bkup = dir.path().join("data").join("bkup");
    std::fs::write(
        bkup.join("states.json"),
        r#"[{"state_code": "ON", "country_code": "ZZ", "name": "Nowhere"}]"#,
    )
    .unwrap();
    geoctl(&dir)
        .args(["seed", "--in-memory"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Seeding failed"));
}

#[test]
fn test_invalid_cloud_config_is_reported() {
    let dir = seed_dir();
    geoctl(&dir)
        .args(["seed", "--in-memory"])
        .env("CLOUD_MONGO", "1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("MONGO_PASSWD"));
}
