//! CLI integration tests.
//!
//! Uses `assert_cmd` to spawn the `formtrans` binary against a registry,
//! settings file, and history log written into a temp directory. No test
//! reaches a model API; translations run against the offline provider.

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const FORMS: &str = r#"{
  "forms": [
    {
      "id": "intake",
      "name": "Patient Intake",
      "category": "clinic",
      "fields": [
        { "name": "full_name", "type": "text" },
        { "name": "contact", "type": "text", "description": "Email or phone" }
      ]
    },
    {
      "id": "referral",
      "name": "Specialist Referral",
      "fields": [
        { "name": "name", "type": "text" },
        { "name": "urgency", "type": "enum", "values": ["routine", "urgent"] }
      ]
    }
  ]
}"#;

fn record_line(id: &str, at: &str, source: &str, target: &str, outcome: &str) -> String {
    serde_json::json!({
        "kind": "record",
        "id": id,
        "request_id": format!("req-{}", id),
        "recorded_at": at,
        "source_form_id": source,
        "target_form_id": target,
        "source_text": "Jo Park needs a cardiology consult",
        "fields": {"name": "Jo Park", "urgency": null},
        "outcome": outcome,
        "warning_count": 1
    })
    .to_string()
}

/// Temp workspace with forms.json, formtrans.toml, and a history log.
fn workspace(history: &[String]) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("forms.json"), FORMS).unwrap();
    fs::write(
        dir.path().join("formtrans.toml"),
        "[registry]\npath = \"forms.json\"\n\n[history]\npath = \"history.jsonl\"\n",
    )
    .unwrap();
    let mut log = history.join("\n");
    if !log.is_empty() {
        log.push('\n');
    }
    fs::write(dir.path().join("history.jsonl"), log).unwrap();
    dir
}

fn formtrans(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("formtrans");
    cmd.current_dir(dir);
    cmd.env_remove("OPENAI_API_KEY");
    cmd.env_remove("ANTHROPIC_API_KEY");
    cmd.env("RUST_LOG", "off");
    cmd
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_describes_tool() {
    let dir = workspace(&[]);
    formtrans(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Translate content written for one form"));
}

#[test]
fn version_exits_0() {
    let dir = workspace(&[]);
    formtrans(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("formtrans"));
}

// ──────────────────────────────────────────────
// 2. Forms
// ──────────────────────────────────────────────

#[test]
fn forms_list_text() {
    let dir = workspace(&[]);
    formtrans(dir.path())
        .args(["forms", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("intake  Patient Intake [clinic]  (2 fields)"))
        .stdout(predicate::str::contains("referral  Specialist Referral  (2 fields)"));
}

#[test]
fn forms_list_json() {
    let dir = workspace(&[]);
    let out = formtrans(dir.path())
        .args(["--output", "json", "forms", "list"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let forms: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(forms.as_array().unwrap().len(), 2);
    assert_eq!(forms[0]["id"], "intake");
    assert_eq!(forms[1]["field_count"], 2);
}

#[test]
fn forms_show_lists_fields_in_order() {
    let dir = workspace(&[]);
    formtrans(dir.path())
        .args(["forms", "show", "referral"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "  name: text\n  urgency: enum [routine | urgent]\n",
        ));
}

#[test]
fn forms_show_unknown_id_fails() {
    let dir = workspace(&[]);
    formtrans(dir.path())
        .args(["forms", "show", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("form not found: nope"));
}

#[test]
fn missing_registry_reports_unavailable() {
    let dir = workspace(&[]);
    fs::remove_file(dir.path().join("forms.json")).unwrap();
    formtrans(dir.path())
        .args(["forms", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("form registry unavailable"));
}

// ──────────────────────────────────────────────
// 3. History and stars
// ──────────────────────────────────────────────

#[test]
fn history_lists_newest_first_with_filters() {
    let dir = workspace(&[
        record_line("a1", "2025-03-01T10:00:00Z", "intake", "referral", "partial"),
        record_line("a2", "2025-03-02T10:00:00Z", "intake", "referral", "ok"),
        record_line("a3", "2025-03-03T10:00:00Z", "referral", "intake", "failed"),
    ]);

    let out = formtrans(dir.path())
        .args(["--output", "json", "history", "--target", "referral"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let entries: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let ids: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["a2", "a1"]);

    formtrans(dir.path())
        .args(["history", "--outcome", "failed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a3"))
        .stdout(predicate::str::contains("referral -> intake"))
        .stdout(predicate::str::contains("a1").not());
}

#[test]
fn history_rejects_unknown_outcome() {
    let dir = workspace(&[]);
    formtrans(dir.path())
        .args(["history", "--outcome", "great"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown outcome 'great'"));
}

#[test]
fn stars_persist_and_reorder_history() {
    let dir = workspace(&[
        record_line("old", "2025-03-01T10:00:00Z", "intake", "referral", "ok"),
        record_line("new", "2025-03-02T10:00:00Z", "intake", "referral", "ok"),
    ]);

    formtrans(dir.path())
        .args(["star", "old"])
        .assert()
        .success()
        .stdout(predicate::str::contains("old: 1 star\n"));
    formtrans(dir.path())
        .args(["--output", "json", "star", "old"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"stars\": 2"));

    let out = formtrans(dir.path())
        .args(["--output", "json", "history"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let entries: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(entries[0]["id"], "old");
    assert_eq!(entries[0]["stars"], 2);
    assert_eq!(entries[1]["stars"], 0);
}

#[test]
fn star_down_floors_at_zero() {
    let dir = workspace(&[record_line("r", "2025-03-01T10:00:00Z", "intake", "referral", "ok")]);
    formtrans(dir.path())
        .args(["star", "r", "--down"])
        .assert()
        .success()
        .stdout(predicate::str::contains("r: 0 stars"));
}

#[test]
fn star_unknown_record_fails() {
    let dir = workspace(&[]);
    formtrans(dir.path())
        .args(["--output", "json", "star", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""))
        .stderr(predicate::str::contains("history record not found: ghost"));
}

// ──────────────────────────────────────────────
// 4. Sessions
// ──────────────────────────────────────────────

#[test]
fn sessions_split_on_gap() {
    let dir = workspace(&[
        record_line("s1", "2025-03-01T10:00:00Z", "intake", "referral", "ok"),
        record_line("s2", "2025-03-01T10:30:00Z", "intake", "referral", "ok"),
        record_line("s3", "2025-03-01T13:00:00Z", "intake", "referral", "ok"),
        record_line("s4", "2025-03-04T09:00:00Z", "intake", "referral", "ok"),
    ]);

    let out = formtrans(dir.path())
        .args(["--output", "json", "sessions"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(report["unique_days"].as_array().unwrap().len(), 2);
    let sessions = report["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 3);
    assert_eq!(sessions[0]["translations"], 2);
    assert_eq!(sessions[0]["minutes"], 30);
}

#[test]
fn sessions_gap_out_of_range_is_rejected() {
    let dir = workspace(&[record_line("s1", "2025-03-01T10:00:00Z", "intake", "referral", "ok")]);
    formtrans(dir.path())
        .args(["sessions", "--gap-minutes", "9223372036854775807"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--gap-minutes"));
    formtrans(dir.path())
        .args(["sessions", "--gap-minutes", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be positive"));
    formtrans(dir.path())
        .args(["sessions", "--gap-minutes", "4294967295"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sessions: 1"));
}

// ──────────────────────────────────────────────
// 5. Translate (no network)
// ──────────────────────────────────────────────

#[test]
fn translate_without_api_key_fails_before_any_call() {
    let dir = workspace(&[]);
    formtrans(dir.path())
        .args(["translate", "--from", "intake", "--to", "referral", "--text", "Jo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no API key"))
        .stderr(predicate::str::contains("OPENAI_API_KEY"));
    let log = fs::read_to_string(dir.path().join("history.jsonl")).unwrap();
    assert!(log.is_empty());
}

fn offline_workspace() -> TempDir {
    let dir = workspace(&[]);
    fs::write(
        dir.path().join("formtrans.toml"),
        "[model]\nprovider = \"offline\"\n\n[registry]\npath = \"forms.json\"\n\n[history]\npath = \"history.jsonl\"\n",
    )
    .unwrap();
    dir
}

#[test]
fn translate_records_history() {
    let dir = offline_workspace();

    let out = formtrans(dir.path())
        .args([
            "translate",
            "--from",
            "intake",
            "--to",
            "referral",
            "--text",
            "Jo Park",
            "--request-id",
            "req-cli-1",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("referral (partial)\n"), "{text}");
    assert!(text.contains("  name     Jo Park\n"), "{text}");
    assert!(text.contains("  urgency  (unknown)\n"), "{text}");
    let record_id = text
        .lines()
        .find_map(|l| l.strip_prefix("history: "))
        .unwrap()
        .to_string();

    let log = fs::read_to_string(dir.path().join("history.jsonl")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 1);
    let record: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(record["kind"], "record");
    assert_eq!(record["id"], record_id.as_str());
    assert_eq!(record["request_id"], "req-cli-1");
    assert_eq!(record["outcome"], "partial");
    assert_eq!(record["fields"]["name"], "Jo Park");

    formtrans(dir.path())
        .args(["history"])
        .assert()
        .success()
        .stdout(predicate::str::contains(record_id.as_str()));
}

#[test]
fn translate_json_output_carries_fields_and_record() {
    let dir = offline_workspace();

    let out = formtrans(dir.path())
        .args(["--output", "json", "translate", "--from", "intake", "--to", "referral"])
        .write_stdin("Sam Lee\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let translation: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(translation["history"]["status"], "recorded");
    assert!(translation["history"]["record_id"].is_string());
    assert_eq!(translation["result"]["status"], "partial");
}

#[test]
fn debug_logging_names_the_command_on_stderr() {
    let dir = workspace(&[]);
    formtrans(dir.path())
        .env("RUST_LOG", "formtrans=debug")
        .args(["forms", "list"])
        .assert()
        .success()
        .stderr(predicate::str::contains("dispatching"))
        .stderr(predicate::str::contains("\"forms\""));
}

#[test]
fn bad_settings_file_is_reported() {
    let dir = workspace(&[]);
    fs::write(dir.path().join("formtrans.toml"), "[model]\nmodle = \"x\"\n").unwrap();
    formtrans(dir.path())
        .args(["forms", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not parse"));
}
