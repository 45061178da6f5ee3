#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use anyhow::Result;
use assert_cmd::Command;
use serde_json::Value;
use tempfile::tempdir;

const ENV_VARS: &[&str] = &[
    "RENTALA_API_BASE",
    "RENTALA_API_TOKEN",
    "RENTALA_CACHE_PREFIX",
    "RENTALA_DATA_DIR",
    "RENTALA_CACHE_TTL_SECS",
    "RENTALA_TIMEOUT_SECS",
    "RENTALA_PAGE_SIZE",
    "RENTALA_LOG",
];

fn rentala(dir: &Path) -> Result<Command> {
    let config = dir.join("config.json");
    if !config.exists() {
        std::fs::write(&config, "{}")?;
    }
    let mut cmd = Command::cargo_bin("rentala")?;
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd.arg("--config").arg(&config).arg("--data-dir").arg(dir);
    Ok(cmd)
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is json")
}

#[test]
fn offline_create_then_list_from_cache() -> Result<()> {
    let dir = tempdir()?;

    let output = rentala(dir.path())?
        .args([
            "--offline",
            "properties",
            "create",
            "--data",
            r#"{"name":"Lake View","status":"active","rent":7800}"#,
        ])
        .output()?;
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let created = stdout_json(&output);
    assert_eq!(created["load"]["state"], "empty");
    assert_eq!(created["load"]["error"]["kind"], "network");
    assert_eq!(created["mutation"]["sync"]["state"], "failed");
    let entity = &created["mutation"]["entity"];
    assert!(entity["id"].as_str().unwrap().starts_with("local-"));
    assert_eq!(entity["unsynced"], true);
    assert_eq!(entity["rent"], 7800.0);
    assert!(dir.path().join("cache.sqlite3").exists());

    let output = rentala(dir.path())?
        .args(["--offline", "properties", "list", "--query", "lake"])
        .output()?;
    assert!(output.status.success());
    let listed = stdout_json(&output);
    assert_eq!(listed["load"]["state"], "cached");
    assert_eq!(listed["page"]["totalCount"], 1);
    assert_eq!(listed["page"]["items"][0]["name"], "Lake View");

    let output = rentala(dir.path())?
        .args(["--offline", "properties", "stats"])
        .output()?;
    assert!(output.status.success());
    let stats = stdout_json(&output);
    assert_eq!(stats["stats"]["total"], 1);
    Ok(())
}

fn rejected(output: &std::process::Output) -> Value {
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    // Log lines precede the pretty-printed error object.
    let start = stderr.find("{\n").expect("error json on stderr");
    serde_json::from_str(&stderr[start..]).expect("error json parses")
}

#[test]
fn invalid_input_exits_with_code_two() -> Result<()> {
    let dir = tempdir()?;

    let output = rentala(dir.path())?
        .args([
            "--offline",
            "tenants",
            "create",
            "--data",
            r#"{"name":"","email":"not-an-email"}"#,
        ])
        .output()?;
    let error = rejected(&output);
    assert_eq!(error["code"], "VALIDATION/INVALID_FIELDS");
    assert!(error["context"]["name"].is_string());
    assert!(error["context"]["email"].is_string());

    let output = rentala(dir.path())?
        .args(["--offline", "payments", "show", "404"])
        .output()?;
    let error = rejected(&output);
    assert_eq!(error["code"], "STORE/NOT_FOUND");
    assert_eq!(error["context"]["id"], "404");

    let output = rentala(dir.path())?
        .args(["--offline", "payments", "create", "--data", "{not json"])
        .output()?;
    assert_eq!(output.status.code(), Some(2));
    Ok(())
}

#[test]
fn first_run_can_seed_examples() -> Result<()> {
    let dir = tempdir()?;
    let output = rentala(dir.path())?
        .args(["--offline", "--seed-examples", "tenants", "list", "--all"])
        .output()?;
    assert!(output.status.success());
    let listed = stdout_json(&output);
    assert_eq!(listed["load"]["state"], "seeded");
    assert_eq!(listed["page"]["totalCount"], 5);
    assert_eq!(listed["page"]["pageSize"], Value::Null);
    Ok(())
}

#[test]
fn unreachable_api_reports_network_error() -> Result<()> {
    let dir = tempdir()?;
    let output = rentala(dir.path())?
        .env("RENTALA_TIMEOUT_SECS", "2")
        .args(["--api-base", "http://127.0.0.1:9", "payments", "list"])
        .output()?;
    assert!(output.status.success());
    let listed = stdout_json(&output);
    assert_eq!(listed["load"]["state"], "empty");
    assert_eq!(listed["load"]["error"]["kind"], "network");
    assert_eq!(listed["page"]["totalCount"], 0);
    Ok(())
}

#[test]
fn stats_print_every_summary_figure() -> Result<()> {
    let dir = tempdir()?;
    let output = rentala(dir.path())?
        .args(["--offline", "--seed-examples", "payments", "stats"])
        .output()?;
    assert!(output.status.success());
    let stats = &stdout_json(&output)["stats"];
    assert!(stats.is_object(), "{stats}");
    for key in ["collected", "pending", "overdue", "totalExpected", "collectionRate"] {
        assert!(stats[key].is_number(), "{key} missing from {stats}");
    }
    Ok(())
}
