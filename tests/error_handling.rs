// tests/error_handling.rs
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

/// Helper function to write a trace file with the given contents
fn trace_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp trace file");
    file.write_all(contents.as_bytes()).expect("write trace");
    file.flush().expect("flush trace");
    file
}

#[test]
fn test_branch_sim_missing_file_exits_with_1() {
    Command::cargo_bin("branch_sim")
        .unwrap()
        .arg("/nonexistent/trace.out")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Could not open file."));
}

#[test]
fn test_cache_sim_missing_file_exits_with_1() {
    Command::cargo_bin("cache_sim")
        .unwrap()
        .arg("/nonexistent/trace.out")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Could not open file."));
}

#[test]
fn test_branch_sim_malformed_line_exits_with_2() {
    // Three separators instead of four; the offending line is echoed.
    let file = trace_file("asm;op;1;2\n");

    Command::cargo_bin("branch_sim")
        .unwrap()
        .arg(file.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Wrong number of fields"))
        .stderr(predicate::str::contains("asm;op;1;2"));
}

#[test]
fn test_cache_sim_malformed_line_exits_with_2() {
    // Four separators instead of five.
    let file = trace_file("lw r1;4096;OP_LOAD;4096;0\n");

    Command::cargo_bin("cache_sim")
        .unwrap()
        .arg(file.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Wrong number of fields"))
        .stderr(predicate::str::contains("lw r1;4096;OP_LOAD;4096;0"));
}

#[test]
fn test_malformed_line_after_valid_records_still_fails() {
    let file = trace_file(
        "jnz label;OP_BRANCH_CC;100;4;C\n\
         mov r1, r2;OP_MOV;104;4;I\n\
         broken line\n",
    );

    Command::cargo_bin("branch_sim")
        .unwrap()
        .arg(file.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("broken line"));
}

#[test]
fn test_branch_sim_requires_a_trace_argument() {
    Command::cargo_bin("branch_sim")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cache_sim_rejects_unknown_prefetcher() {
    let file = trace_file("");

    Command::cargo_bin("cache_sim")
        .unwrap()
        .args(["--prefetcher", "bogus"])
        .arg(file.path())
        .assert()
        .failure();
}

#[test]
fn test_branch_sim_reports_statistics() {
    let file = trace_file(
        &"jnz label;OP_BRANCH_CC;100;4;C\nmov r1, r2;OP_MOV;104;4;I\n".repeat(3),
    );

    Command::cargo_bin("branch_sim")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Cycles: 10"))
        .stdout(predicate::str::contains("Acum_hit: 2"))
        .stdout(predicate::str::contains("Acum_miss: 5"))
        .stdout(predicate::str::contains("Acum_miss_pred: 0"));
}

#[test]
fn test_cache_sim_reports_statistics() {
    let file = trace_file(
        "lw r1, 0(r2);256;OP_LOAD;4096;0;0\n\
         lw r1, 0(r2);256;OP_LOAD;4096;0;0\n",
    );

    Command::cargo_bin("cache_sim")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Cycles: 160"))
        .stdout(predicate::str::contains("L1 Hit/Miss: 1/1"))
        .stdout(predicate::str::contains("L2 Hit/Miss: 0/1"))
        .stdout(predicate::str::contains("Prefetches Used/Total: 0/0"))
        .stdout(predicate::str::contains("Miss Rate: 0.666667"))
        .stdout(predicate::str::contains("Prefetch Rate: 0.000000"));
}

#[test]
fn test_cache_sim_verbose_echoes_records() {
    let file = trace_file("lw r1, 0(r2);256;OP_LOAD;4096;0;0\n");

    Command::cargo_bin("cache_sim")
        .unwrap()
        .arg("-v")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            " Asm:lw r1, 0(r2) Opcode:OP_LOAD Address:256 First read register:4096",
        ));
}

#[test]
fn test_branch_sim_verbose_echoes_records() {
    let file = trace_file("jnz label;OP_BRANCH_CC;100;4;C\n");

    Command::cargo_bin("branch_sim")
        .unwrap()
        .arg("--verbose")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            " Asm:jnz label Opcode:OP_BRANCH_CC Address:100 Size:4 Cond?:C",
        ));
}

#[test]
fn test_json_export_matches_the_report() {
    let dir = tempfile::tempdir().expect("temp dir");
    let json_path = dir.path().join("stats.json");
    let file = trace_file(
        "lw r1, 0(r2);256;OP_LOAD;4096;0;0\n\
         lw r1, 0(r2);256;OP_LOAD;4096;0;0\n",
    );

    Command::cargo_bin("cache_sim")
        .unwrap()
        .arg("--json")
        .arg(&json_path)
        .arg(file.path())
        .assert()
        .success();

    let exported: serde_json::Value =
        serde_json::from_reader(std::fs::File::open(&json_path).unwrap()).unwrap();
    assert_eq!(exported["cycles"], 160);
    assert_eq!(exported["l1_hits"], 1);
    assert_eq!(exported["l2_misses"], 1);
}

#[test]
fn test_seed_makes_vldp_runs_identical() {
    let mut contents = String::new();
    for i in 0..200u64 {
        let address = (i % 70) * 8192 + (i * 192) % 8192;
        contents.push_str(&format!("lw r1, 0(r2);256;OP_LOAD;{};0;0\n", address));
    }
    let file = trace_file(&contents);

    let output = |seed: &str| {
        Command::cargo_bin("cache_sim")
            .unwrap()
            .args(["--prefetcher", "vldp", "--seed", seed])
            .arg(file.path())
            .output()
            .unwrap()
            .stdout
    };

    assert_eq!(output("7"), output("7"));
}
