//! End-to-end CLI integration tests
//!
//! These tests invoke the compiled binary as a subprocess to verify
//! that the CLI behaves correctly from a user's perspective.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Returns a Command configured to run our binary.
///
/// Note: `cargo_bin` is marked deprecated for edge cases involving custom
/// cargo build directories, but works correctly for standard project layouts.
#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

/// A command run inside `dir`, logging into a sibling directory.
fn cmd_in(dir: &Path, logs: &TempDir) -> Command {
    let mut cmd = cmd();
    cmd.env("REBUMP_LOG_DIR", logs.path())
        .env_remove("RUST_LOG")
        .arg("-C")
        .arg(dir);
    cmd
}

/// A project with a `VERSION` file and a matching config.
fn project(config: &str, files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".rebump.toml"), config).unwrap();
    for (name, body) in files {
        let path = tmp.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }
    tmp
}

const BASIC: &str = r#"
current_version = "1.2.3"

[[files]]
filename = "VERSION"
"#;

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_shows_usage() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("Options:"));
}

#[test]
fn long_help_lists_env_vars() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("REBUMP_LOG_DIR"));
}

#[test]
fn version_flag_shows_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn bump_help_shows_options() {
    cmd()
        .args(["bump", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--new-version"))
        .stdout(predicate::str::contains("--dry-run"));
}

// =============================================================================
// Global Flags
// =============================================================================

#[test]
fn global_flags_accepted() {
    let logs = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();
    for flags in [
        &["--quiet"][..],
        &["-q"],
        &["--verbose"],
        &["-vv"],
        &["--color", "always"],
        &["--color", "never"],
    ] {
        cmd_in(tmp.path(), &logs)
            .args(flags)
            .arg("show")
            .assert()
            .success();
    }
}

#[test]
fn chdir_nonexistent_fails() {
    cmd()
        .args(["-C", "/nonexistent/path/that/does/not/exist", "show"])
        .assert()
        .failure();
}

// =============================================================================
// Error Cases
// =============================================================================

#[test]
fn no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn invalid_subcommand_shows_error() {
    cmd()
        .arg("not-a-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn bump_requires_new_version() {
    cmd()
        .arg("bump")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--new-version"));
}

// =============================================================================
// Bump Command
// =============================================================================

#[test]
fn bump_rewrites_configured_file() {
    let logs = TempDir::new().unwrap();
    let tmp = project(BASIC, &[("VERSION", "version = 1.2.3\n")]);

    cmd_in(tmp.path(), &logs)
        .args(["bump", "--new-version", "1.3.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1.3.0"));

    assert_eq!(
        fs::read_to_string(tmp.path().join("VERSION")).unwrap(),
        "version = 1.3.0\n"
    );
}

#[test]
fn bump_dry_run_leaves_files_alone() {
    let logs = TempDir::new().unwrap();
    let tmp = project(BASIC, &[("VERSION", "1.2.3\n")]);

    cmd_in(tmp.path(), &logs)
        .args(["--color", "never", "bump", "--new-version", "2.0.0", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-1.2.3"))
        .stdout(predicate::str::contains("+2.0.0"));

    assert_eq!(
        fs::read_to_string(tmp.path().join("VERSION")).unwrap(),
        "1.2.3\n"
    );
}

#[test]
fn bump_json_reports_modified_files() {
    let logs = TempDir::new().unwrap();
    let tmp = project(BASIC, &[("VERSION", "1.2.3\n")]);

    let output = cmd_in(tmp.path(), &logs)
        .args(["--json", "bump", "--new-version", "1.2.4"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("bump --json should output valid JSON");
    assert_eq!(json["current_version"], "1.2.3");
    assert_eq!(json["new_version"], "1.2.4");
    assert_eq!(json["modified_files"], serde_json::json!(["VERSION"]));
}

#[test]
fn bump_from_subdirectory_uses_config_root() {
    let logs = TempDir::new().unwrap();
    let tmp = project(BASIC, &[("VERSION", "1.2.3\n"), ("src/lib.txt", "")]);

    cmd_in(&tmp.path().join("src"), &logs)
        .args(["bump", "--new-version", "1.3.0"])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(tmp.path().join("VERSION")).unwrap(),
        "1.3.0\n"
    );
}

#[test]
fn bump_with_explicit_config_uses_its_directory() {
    let logs = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();
    let cfg = tmp.path().join("cfg");
    fs::create_dir(&cfg).unwrap();
    fs::write(cfg.join("release.toml"), BASIC).unwrap();
    fs::write(cfg.join("VERSION"), "1.2.3\n").unwrap();
    fs::write(tmp.path().join("VERSION"), "1.2.3\n").unwrap();

    cmd_in(tmp.path(), &logs)
        .args(["--config", "cfg/release.toml"])
        .args(["bump", "--new-version", "1.3.0"])
        .assert()
        .success();

    assert_eq!(fs::read_to_string(cfg.join("VERSION")).unwrap(), "1.3.0\n");
    assert_eq!(
        fs::read_to_string(tmp.path().join("VERSION")).unwrap(),
        "1.2.3\n"
    );
}

#[test]
fn bump_extra_files_from_command_line() {
    let logs = TempDir::new().unwrap();
    let tmp = project(
        BASIC,
        &[("VERSION", "1.2.3\n"), ("README.md", "Install 1.2.3\n")],
    );

    cmd_in(tmp.path(), &logs)
        .args(["bump", "--new-version", "1.3.0", "README.md"])
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(tmp.path().join("README.md")).unwrap(),
        "Install 1.3.0\n"
    );
}

#[test]
fn bump_glob_respects_exclusions() {
    let logs = TempDir::new().unwrap();
    let tmp = project(
        r#"
current_version = "0.9.0"
excluded_paths = ["b.txt"]

[[files]]
glob = "*.txt"
"#,
        &[("a.txt", "v0.9.0\n"), ("b.txt", "v0.9.0\n")],
    );

    cmd_in(tmp.path(), &logs)
        .args(["bump", "--new-version", "1.0.0"])
        .assert()
        .success();

    assert_eq!(fs::read_to_string(tmp.path().join("a.txt")).unwrap(), "v1.0.0\n");
    assert_eq!(fs::read_to_string(tmp.path().join("b.txt")).unwrap(), "v0.9.0\n");
}

#[test]
fn bump_missing_pattern_fails_without_writing() {
    let logs = TempDir::new().unwrap();
    let tmp = project(
        r#"
current_version = "1.2.3"

[[files]]
filename = "VERSION"

[[files]]
filename = "OTHER"
"#,
        &[("VERSION", "1.2.3\n"), ("OTHER", "no version here\n")],
    );

    cmd_in(tmp.path(), &logs)
        .args(["bump", "--new-version", "1.3.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("OTHER"));

    assert_eq!(
        fs::read_to_string(tmp.path().join("VERSION")).unwrap(),
        "1.2.3\n"
    );
}

#[test]
fn bump_updates_json_key_path() {
    let logs = TempDir::new().unwrap();
    let tmp = project(
        r#"
current_version = "1.2.3"

[[files]]
filename = "package.json"
key_path = "version"
"#,
        &[(
            "package.json",
            "{\n  \"name\": \"demo\",\n  \"version\": \"1.2.3\",\n  \"engines\": {\"node\": \"1.2.3\"}\n}\n",
        )],
    );

    cmd_in(tmp.path(), &logs)
        .args(["bump", "--new-version", "2.0.0"])
        .assert()
        .success();

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("package.json")).unwrap())
            .unwrap();
    assert_eq!(json["version"], "2.0.0");
    assert_eq!(json["engines"]["node"], "1.2.3");
}

// =============================================================================
// Show & Files Commands
// =============================================================================

#[test]
fn show_prints_single_value() {
    let logs = TempDir::new().unwrap();
    let tmp = project(BASIC, &[("VERSION", "1.2.3\n")]);

    cmd_in(tmp.path(), &logs)
        .args(["show", "current_version"])
        .assert()
        .success()
        .stdout("1.2.3\n");
}

#[test]
fn show_resolves_placeholders() {
    let logs = TempDir::new().unwrap();
    let tmp = project(BASIC, &[("VERSION", "1.2.3\n")]);

    cmd_in(tmp.path(), &logs)
        .args(["show", "new_minor", "--new-version", "1.4.0"])
        .assert()
        .success()
        .stdout("4\n");
}

#[test]
fn show_unknown_key_fails() {
    let logs = TempDir::new().unwrap();
    let tmp = project(BASIC, &[("VERSION", "1.2.3\n")]);

    cmd_in(tmp.path(), &logs)
        .args(["show", "definitely_not_a_key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("definitely_not_a_key"));
}

#[test]
fn files_json_lists_targets() {
    let logs = TempDir::new().unwrap();
    let tmp = project(BASIC, &[("VERSION", "1.2.3\n")]);

    let output = cmd_in(tmp.path(), &logs)
        .args(["--json", "files"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json[0]["filename"], "VERSION");
    assert_eq!(json[0]["included"], true);
}

// =============================================================================
// Doctor Command
// =============================================================================

#[test]
fn doctor_json_reports_config() {
    let logs = TempDir::new().unwrap();
    let tmp = project(BASIC, &[("VERSION", "1.2.3\n")]);

    let output = cmd_in(tmp.path(), &logs)
        .args(["--json", "doctor"])
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["config"]["found"], true);
    assert_eq!(json["config"]["current_version"], "1.2.3");
    assert!(json["config"]["error"].is_null());
}

// =============================================================================
// Logging
// =============================================================================

#[test]
fn logs_go_to_log_dir_not_stdout() {
    let logs = TempDir::new().unwrap();
    let tmp = project(BASIC, &[("VERSION", "1.2.3\n")]);

    cmd_in(tmp.path(), &logs)
        .args(["-v", "show", "current_version"])
        .assert()
        .success()
        .stdout("1.2.3\n");

    let has_log = fs::read_dir(logs.path())
        .unwrap()
        .filter_map(Result::ok)
        .any(|e| e.file_name().to_string_lossy().starts_with("rebump.jsonl"));
    assert!(has_log, "expected a rebump.jsonl* file in the log dir");
}
