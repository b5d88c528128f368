//! CLI integration tests for the `planta` subcommands.
//!
//! Uses `assert_cmd` to spawn the `planta` binary and verify exit codes,
//! stdout content, and stderr content.
//!
//! Every test runs in a fresh temporary directory with an explicit config
//! file seeding the memory backend, so no `planta.toml` or `PLANTA_*`
//! variable from the environment leaks in. Each invocation is its own
//! process, so state never carries over between commands.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const CONFIG: &str = r#"
[store]
backend = "memory"

[[equipment]]
id = "motor-1"
name = "Motor 1"

[[equipment]]
id = "motor-2"
name = "Motor 2"
"#;

/// A temp directory holding `planta.toml`.
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("planta.toml"), CONFIG).unwrap();
    dir
}

/// Helper: a `planta` command rooted in `dir` with its config.
fn planta(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("planta");
    cmd.current_dir(dir.path());
    cmd.arg("--config").arg(dir.path().join("planta.toml"));
    for var in [
        "PLANTA_CONFIG",
        "PLANTA_API_KEY",
        "PLANTA_RATE_LIMIT",
        "PLANTA_OPERATOR_ID",
        "PLANTA_OPERATOR_NAME",
        "PLANTA_OPERATOR_ROLE",
        "AIRTABLE_BASE_ID",
        "AIRTABLE_TOKEN",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    let dir = workspace();
    planta(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Shift and equipment state coordinator",
        ));
}

#[test]
fn version_exits_0() {
    let dir = workspace();
    planta(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("planta"));
}

#[test]
fn unknown_subcommand_fails() {
    let dir = workspace();
    planta(&dir).arg("defrost").assert().failure();
}

// ──────────────────────────────────────────────
// 2. Configuration
// ──────────────────────────────────────────────

#[test]
fn missing_config_file_exits_1() {
    let dir = TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("planta");
    cmd.current_dir(dir.path())
        .env_remove("PLANTA_CONFIG")
        .args(["--config", "does-not-exist.toml", "checklist"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("could not read"));
}

#[test]
fn unknown_config_key_exits_1() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("planta.toml"), "[server]\nportt = 1\n").unwrap();
    let mut cmd = cargo_bin_cmd!("planta");
    cmd.current_dir(dir.path())
        .env_remove("PLANTA_CONFIG")
        .args(["--config", "planta.toml", "checklist"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("could not parse"));
}

// ──────────────────────────────────────────────
// 3. Checklist
// ──────────────────────────────────────────────

#[test]
fn checklist_lists_all_items() {
    let dir = workspace();
    planta(&dir)
        .arg("checklist")
        .assert()
        .success()
        .stdout(predicate::str::contains(" 1. Elementos de Protección Personal disponibles"))
        .stdout(predicate::str::contains("19. Lavado de radiador (si aplica)"));
}

#[test]
fn checklist_json_has_19_items() {
    let dir = workspace();
    let output = planta(&dir)
        .args(["--output", "json", "checklist"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["items"].as_array().unwrap().len(), 19);
    assert_eq!(json["items"][4], "CH4 > 50%");
}

// ──────────────────────────────────────────────
// 4. Shifts and equipment
// ──────────────────────────────────────────────

#[test]
fn shift_active_reports_none() {
    let dir = workspace();
    planta(&dir)
        .args(["shift", "active"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No active shift"));
}

#[test]
fn shift_open_prints_owner() {
    let dir = workspace();
    planta(&dir)
        .args([
            "shift",
            "open",
            "--operator-id",
            "op-7",
            "--operator-name",
            "Ana",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("opened by Ana"));
}

#[test]
fn shift_open_reads_operator_from_env() {
    let dir = workspace();
    planta(&dir)
        .env("PLANTA_OPERATOR_ID", "op-9")
        .env("PLANTA_OPERATOR_NAME", "Luis")
        .args(["shift", "open"])
        .assert()
        .success()
        .stdout(predicate::str::contains("opened by Luis"));
}

#[test]
fn shift_close_unknown_id_exits_1() {
    let dir = workspace();
    planta(&dir)
        .args([
            "shift",
            "close",
            "recMISSING",
            "--operator-id",
            "op-7",
            "--operator-name",
            "Ana",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn equipment_list_shows_seeded_units() {
    let dir = workspace();
    planta(&dir)
        .args(["equipment", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("motor-1\tMotor 1"))
        .stdout(predicate::str::contains("motor-2\tMotor 2"));
}

#[test]
fn equipment_state_without_records() {
    let dir = workspace();
    planta(&dir)
        .args(["equipment", "state", "motor-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("motor-1: no state recorded"));
}

#[test]
fn equipment_state_unknown_exits_1() {
    let dir = workspace();
    planta(&dir)
        .args(["equipment", "state", "motor-9"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found: motor-9"));
}

// ──────────────────────────────────────────────
// 5. Power state changes
// ──────────────────────────────────────────────

#[test]
fn set_state_without_shift_is_forbidden() {
    let dir = workspace();
    planta(&dir)
        .args([
            "equipment",
            "set",
            "motor-1",
            "off",
            "--operator-id",
            "op-7",
            "--operator-name",
            "Ana",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("forbidden: no active shift"));
}

#[test]
fn privileged_role_turns_on_with_full_checklist() {
    let dir = workspace();
    planta(&dir)
        .args([
            "equipment",
            "set",
            "motor-1",
            "on",
            "--all-yes",
            "--operator-id",
            "op-1",
            "--operator-name",
            "Marta",
            "--role",
            "CTO",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("motor-1 set to Encendido"));
}

#[test]
fn turning_on_without_checklist_lists_missing_items() {
    let dir = workspace();
    planta(&dir)
        .args([
            "equipment",
            "set",
            "motor-1",
            "Encendido",
            "--operator-id",
            "op-1",
            "--operator-name",
            "Marta",
            "--role",
            "CTO",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("startup checklist incomplete"))
        .stderr(predicate::str::contains("CH4 > 50%"));
}

#[test]
fn negative_answer_warns_but_succeeds() {
    let dir = workspace();
    planta(&dir)
        .args([
            "equipment",
            "set",
            "motor-2",
            "on",
            "--all-yes",
            "--no",
            "O2 < 3%",
            "--operator-id",
            "op-1",
            "--operator-name",
            "Marta",
            "--role",
            "CEO",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("checklist answered \"No\" for: O2 < 3%"));
}

#[test]
fn unknown_checklist_item_is_usage_error() {
    let dir = workspace();
    planta(&dir)
        .args([
            "equipment",
            "set",
            "motor-1",
            "on",
            "--all-yes",
            "--no",
            "Frenos revisados",
            "--operator-id",
            "op-1",
            "--operator-name",
            "Marta",
            "--role",
            "CTO",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("is not a checklist item"));
}

#[test]
fn checklist_file_is_read() {
    let dir = workspace();
    let answers: serde_json::Map<String, serde_json::Value> = [
        "Elementos de Protección Personal disponibles",
        "Elementos de Protección Personal en buen estado",
        "Aceite al 50% (mirilla)",
        "Presión refrigerante 1.5 bar",
        "CH4 > 50%",
        "O2 < 3%",
        "H2S < 300ppm",
        "Mangueras en buen estado",
        "Válvulas de gas abiertas",
        "Ventiladores encendidos",
        "Equipos Biofiltro funcionando",
        "Encendido correcto",
        "Planilla actualizada",
        "Temperatura refrigerante 80-90°C",
        "Presión aceite 3.5 bar",
        "Carga trabajo < 1000kW",
        "Horómetro inicial registrado",
        "Composición de biogás controlada",
        "Lavado de radiador (si aplica)",
    ]
    .iter()
    .map(|item| (item.to_string(), serde_json::json!("Sí")))
    .collect();
    let path = dir.path().join("checklist.json");
    fs::write(
        &path,
        serde_json::json!({ "answers": answers, "notes": "sin novedad" }).to_string(),
    )
    .unwrap();

    let output = planta(&dir)
        .args(["--output", "json", "equipment", "set", "motor-1", "on", "--checklist"])
        .arg(&path)
        .args([
            "--operator-id",
            "op-1",
            "--operator-name",
            "Marta",
            "--role",
            "Desarrollador",
        ])
        .output()
        .unwrap();
    assert!(output.status.success(), "{:?}", output);
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["record"]["state"], "Encendido");
    assert_eq!(json["checklist"]["notes"], "sin novedad");
    assert_eq!(json["negative_items"].as_array().unwrap().len(), 0);
}

#[test]
fn invalid_state_is_rejected_by_parser() {
    let dir = workspace();
    planta(&dir)
        .args([
            "equipment",
            "set",
            "motor-1",
            "standby",
            "--operator-id",
            "op-1",
            "--operator-name",
            "Marta",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown power state"));
}

// ──────────────────────────────────────────────
// 6. Monitoring and reconciliation
// ──────────────────────────────────────────────

#[test]
fn monitor_record_without_shift_is_forbidden() {
    let dir = workspace();
    planta(&dir)
        .args([
            "monitor",
            "record",
            "motor-1",
            "--horometer",
            "100",
            "--starts",
            "3",
            "--m3",
            "5000",
            "--kw",
            "2000",
            "--operator-id",
            "op-7",
            "--operator-name",
            "Ana",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no active shift"));
}

#[test]
fn monitor_record_opens_first_interval() {
    let dir = workspace();
    planta(&dir)
        .args([
            "monitor",
            "record",
            "motor-1",
            "--horometer",
            "100",
            "--starts",
            "3",
            "--m3",
            "5000",
            "--kw",
            "2000",
            "--operator-id",
            "op-1",
            "--operator-name",
            "Marta",
            "--role",
            "CTO",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Opened interval"))
        .stdout(predicate::str::contains("Closed interval").not());
}

#[test]
fn monitor_record_rejects_non_finite_reading() {
    let dir = workspace();
    planta(&dir)
        .args([
            "monitor",
            "record",
            "motor-1",
            "--horometer",
            "NaN",
            "--starts",
            "3",
            "--m3",
            "5000",
            "--kw",
            "inf",
            "--operator-id",
            "op-1",
            "--operator-name",
            "Marta",
            "--role",
            "CTO",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "invalid readings: horometer must be a finite number",
        ));
}

#[test]
fn monitor_ledger_empty() {
    let dir = workspace();
    planta(&dir)
        .args(["monitor", "ledger", "motor-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 intervals, 0 open, 0 gaps"));
}

#[test]
fn reconcile_clean_store_exits_0() {
    let dir = workspace();
    planta(&dir)
        .arg("reconcile")
        .assert()
        .success()
        .stdout(predicate::str::contains("All startups have checklist records"));
}

// ──────────────────────────────────────────────
// 7. Output modes
// ──────────────────────────────────────────────

#[test]
fn json_errors_go_to_stderr() {
    let dir = workspace();
    let output = planta(&dir)
        .args(["--output", "json", "equipment", "state", "motor-9"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stderr).unwrap();
    assert!(json["error"].as_str().unwrap().contains("motor-9"));
}

#[test]
fn quiet_suppresses_error_output() {
    let dir = workspace();
    planta(&dir)
        .args(["--quiet", "equipment", "state", "motor-9"])
        .assert()
        .code(1)
        .stderr(predicate::str::is_empty());
}
