//! End-to-end tests against the compiled `queuectl` binary, using a
//! scratch database per test.

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd(db: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("queuectl").unwrap();
    cmd.arg("--db-path").arg(db);
    cmd
}

#[test]
fn enqueue_then_get_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("queue.db");

    cmd(&db)
        .arg("enqueue")
        .arg(r#"{"id":"job-1","command":"echo hi"}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("enqueued successfully"));

    cmd(&db)
        .arg("get")
        .arg("job-1")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\": \"job-1\""))
        .stdout(predicate::str::contains("\"state\": \"pending\""));
}

#[test]
fn enqueue_duplicate_id_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("queue.db");

    cmd(&db)
        .arg("enqueue")
        .arg(r#"{"id":"job-1","command":"echo hi"}"#)
        .assert()
        .success();

    cmd(&db)
        .arg("enqueue")
        .arg(r#"{"id":"job-1","command":"echo hi"}"#)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn get_missing_job_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("queue.db");

    cmd(&db)
        .arg("get")
        .arg("nope")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn list_with_no_jobs_reports_empty() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("queue.db");

    cmd(&db).arg("list").assert().success().stdout(predicate::str::contains("No jobs found"));
}

#[test]
fn clear_with_yes_flag_skips_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("queue.db");

    cmd(&db)
        .arg("enqueue")
        .arg(r#"{"id":"job-1","command":"echo hi"}"#)
        .assert()
        .success();

    cmd(&db)
        .arg("clear")
        .arg("--yes")
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted 1 job(s)"));

    cmd(&db).arg("list").assert().success().stdout(predicate::str::contains("No jobs found"));
}

#[test]
fn dlq_retry_on_non_dead_job_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("queue.db");

    cmd(&db)
        .arg("enqueue")
        .arg(r#"{"id":"job-1","command":"echo hi"}"#)
        .assert()
        .success();

    cmd(&db)
        .arg("dlq")
        .arg("retry")
        .arg("job-1")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not in DLQ"));
}

#[test]
fn config_set_unknown_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("queue.db");

    cmd(&db)
        .arg("config")
        .arg("set")
        .arg("nonsense")
        .arg("1")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid config key"));
}

#[test]
fn config_set_then_show_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("queue.db");

    cmd(&db)
        .arg("config")
        .arg("set")
        .arg("max-retries")
        .arg("7")
        .assert()
        .success()
        .stdout(predicate::str::contains("max-retries = 7"));

    cmd(&db)
        .arg("config")
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("max-retries"));
}

#[test]
fn worker_status_with_no_workers_reports_none_running() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("queue.db");
    let pid_file = dir.path().join("workers.pid");

    cmd(&db)
        .arg("--pid-file")
        .arg(&pid_file)
        .arg("worker")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No workers running"));
}
