use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn beadview_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_beadview"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let home = TempDir::new().expect("home");
    beadview_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("list"))
        .stdout(contains("watch"))
        .stdout(contains("probe"))
        .stdout(contains("config"));
}

#[test]
fn config_path_points_into_home() {
    let home = TempDir::new().expect("home");
    beadview_cmd(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(contains(".beadview"))
        .stdout(contains("config.yaml"));
}

#[test]
fn config_init_writes_defaults_once() {
    let home = TempDir::new().expect("home");
    beadview_cmd(home.path())
        .args(["config", "init"])
        .assert()
        .success();
    assert!(home.path().join(".beadview").join("config.yaml").exists());

    beadview_cmd(home.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(contains("already exists"));

    beadview_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(contains("detect_interval_ms: 1000"))
        .stdout(contains("debounce_ms: 500"));
}

#[test]
fn probe_reports_classes_as_json() {
    let home = TempDir::new().expect("home");
    let root = TempDir::new().expect("root");
    fs::create_dir_all(root.path().join("noms")).expect("noms dir");
    fs::write(root.path().join("noms").join("journal"), "abc").expect("journal");
    fs::write(root.path().join("noms").join("LOCK"), "").expect("lock");
    fs::write(root.path().join("beads.db"), "db").expect("db");

    let assert = beadview_cmd(home.path())
        .args(["probe", "--json", "--root"])
        .arg(root.path())
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let report: serde_json::Value = serde_json::from_str(&stdout).expect("probe JSON");

    assert_eq!(report["usable"], true);
    let files = report["files"].as_array().expect("files array");
    let class_of = |path: &str| {
        files
            .iter()
            .find(|f| f["path"] == path)
            .map(|f| f["class"].as_str().unwrap_or_default().to_string())
    };
    assert_eq!(class_of("noms/journal").as_deref(), Some("size"));
    assert_eq!(class_of("noms/LOCK").as_deref(), Some("ignore"));
    assert_eq!(class_of("beads.db").as_deref(), Some("mtime"));
}

#[test]
fn probe_without_root_explains_fallback() {
    let home = TempDir::new().expect("home");
    let missing = home.path().join("nowhere");
    beadview_cmd(home.path())
        .args(["probe", "--root"])
        .arg(&missing)
        .assert()
        .success()
        .stdout(contains("no usable root"));
}

#[test]
fn list_fails_cleanly_without_bd() {
    let home = TempDir::new().expect("home");
    beadview_cmd(home.path())
        .args(["list", "--bd"])
        .arg(home.path().join("missing-bd"))
        .assert()
        .failure()
        .stderr(contains("bd").and(contains("Error")));
}

#[cfg(unix)]
mod fake_bd {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    const ISSUES: &str = r#"[
  {"id": "bd-1", "title": "Fix login redirect", "status": "open", "priority": 1,
   "issue_type": "bug", "updated_at": "2024-05-01T10:00:00Z"},
  {"id": "bd-2", "title": "Ship dark mode", "status": "closed", "priority": 2,
   "issue_type": "feature", "labels": "ui,theme", "updated_at": "2024-05-02T10:00:00Z"},
  {"id": "bd-3", "title": "Write release notes", "status": "in_progress", "priority": 0,
   "issue_type": "task", "assignee": "sam", "updated_at": "2024-05-03T10:00:00Z"}
]"#;

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("bd");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        let mut perms = fs::metadata(&path).expect("stat script").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("chmod script");
        path
    }

    fn listing_bd(dir: &Path) -> PathBuf {
        fs::write(dir.join("issues.json"), ISSUES).expect("issues");
        script(dir, &format!("cat '{}'", dir.join("issues.json").display()))
    }

    #[test]
    fn list_shows_open_work_sorted_by_priority() {
        let home = TempDir::new().expect("home");
        let bd = listing_bd(home.path());

        let assert = beadview_cmd(home.path())
            .args(["list", "--bd"])
            .arg(&bd)
            .assert()
            .success()
            .stdout(contains("Fix login redirect"))
            .stdout(contains("Write release notes"))
            .stdout(contains("Showing 2 of 3 issues"))
            .stdout(contains("Ship dark mode").not());
        let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
        let first = stdout.find("bd-3").expect("bd-3 listed");
        let second = stdout.find("bd-1").expect("bd-1 listed");
        assert!(first < second, "P0 should sort before P1:\n{stdout}");
    }

    #[test]
    fn list_json_honours_filters() {
        let home = TempDir::new().expect("home");
        let bd = listing_bd(home.path());

        let assert = beadview_cmd(home.path())
            .args(["list", "--json", "--all", "--label", "ui", "--bd"])
            .arg(&bd)
            .assert()
            .success();
        let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
        let issues: serde_json::Value = serde_json::from_str(&stdout).expect("list JSON");
        let issues = issues.as_array().expect("array");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0]["id"], "bd-2");
        assert_eq!(issues[0]["labels"], serde_json::json!(["ui", "theme"]));
    }

    #[test]
    fn list_surfaces_bd_failure() {
        let home = TempDir::new().expect("home");
        let bd = script(home.path(), "echo 'no beads database found' >&2\nexit 1");

        beadview_cmd(home.path())
            .args(["list", "--bd"])
            .arg(&bd)
            .assert()
            .failure()
            .stderr(contains("no beads database found"));
    }
}
