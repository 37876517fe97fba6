//! Command line behavior. Cases that drive BLAST+ skip quietly when the
//! executables are not installed.

use std::path::Path;
use std::process::Command;

use repfind::fasta::write_wrapped;
use repfind::store::key::{self, HitKey};
use repfind::store::{Order, Store};

fn repfind_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_repfind"))
}

fn blast_available() -> bool {
    let probe = |program: &str| {
        Command::new(program)
            .arg("-version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    };
    probe("blastn") && probe("makeblastdb")
}

fn make_seq(seed: u64, len: usize) -> Vec<u8> {
    let bases = [b'A', b'C', b'G', b'T'];
    let mut seq = Vec::with_capacity(len);
    let mut state = 0x9e37_79b9_7f4a_7c15u64 ^ seed;
    for _ in 0..len {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        seq.push(bases[(state >> 32) as usize & 3]);
    }
    seq
}

fn write_fasta(path: &Path, id: &str, desc: &str, seq: &[u8]) {
    let mut out = Vec::new();
    let desc = if desc.is_empty() { None } else { Some(desc) };
    write_wrapped(&mut out, id, desc, seq).unwrap();
    std::fs::write(path, out).unwrap();
}

#[test]
fn missing_required_arguments_exit_2() {
    let status = repfind_cmd()
        .arg("search")
        .output()
        .expect("run repfind")
        .status;
    assert_eq!(status.code(), Some(2));
}

#[test]
fn reserved_pass_through_flags_exit_2() {
    let output = repfind_cmd()
        .args([
            "search",
            "--query",
            "genome.fasta",
            "--lib",
            "lib.fasta",
            "--blastn-flags",
            "-db other",
        ])
        .output()
        .expect("run repfind");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("-db"), "stderr: {stderr}");
}

#[test]
fn unknown_recovery_store_exits_2() {
    let output = repfind_cmd()
        .args([
            "search",
            "--query",
            "genome.fasta",
            "--lib",
            "lib.fasta",
            "--recover",
            "work/other.db",
        ])
        .output()
        .expect("run repfind");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn audit_rejects_unknown_store_basename() {
    let status = repfind_cmd()
        .args(["audit", "--db", "somewhere/other.db"])
        .output()
        .expect("run repfind")
        .status;
    assert_eq!(status.code(), Some(2));
}

#[test]
fn audit_dumps_regions_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("regions.db");
    {
        let store = Store::create(&db, Order::GroupByQuery).unwrap();
        let region = HitKey {
            subject_acc: "chr1".to_string(),
            subject_left: 1000,
            subject_right: 1060,
            query_acc: "L1".to_string(),
            query_start: 0,
            query_end: 0,
            bit_score: 0.0,
            strand: 1,
        };
        store
            .set(&region.marshal(), &key::marshal_count(2))
            .unwrap();
        store.close().unwrap();
    }

    let output = repfind_cmd()
        .args(["audit", "--db"])
        .arg(&db)
        .output()
        .expect("run repfind");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let value: serde_json::Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(value["subject_acc"], "chr1");
    assert_eq!(value["subject_left"], 1000);
    assert_eq!(value["subject_right"], 1060);
    assert_eq!(value["query_acc"], "L1");
    assert_eq!(value["strand"], 1);
    assert_eq!(value["count"], 2);
}

#[test]
fn search_emits_features_and_a_masked_copy() {
    if !blast_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();

    let element = make_seq(7, 300);
    let mut genome = make_seq(1, 5000);
    genome[1500..1800].copy_from_slice(&element);
    write_fasta(&dir.path().join("genome.fasta"), "chr1", "", &genome);
    write_fasta(&dir.path().join("lib.fasta"), "R1", "SINE/test", &element);

    let output = repfind_cmd()
        .current_dir(dir.path())
        .args([
            "search",
            "--query",
            "genome.fasta",
            "--lib",
            "lib.fasta",
            "--cores",
            "1",
        ])
        .output()
        .expect("run repfind");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!stdout.is_empty(), "no features written");
    for line in stdout.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 9, "line: {line}");
        assert_eq!(fields[0], "chr1");
        assert_eq!(fields[1], "repfind");
        assert_eq!(fields[2], "repeat");
        assert!(fields[8].starts_with("Repeat R1 SINE/test "), "line: {line}");
        assert!(fields[8].contains("; UID "), "line: {line}");
        assert!(fields[8].contains("; SumScore "), "line: {line}");
    }

    let masked = dir.path().join("genome.fasta-masked.fasta");
    assert!(masked.exists(), "masked copy missing");
    let text = std::fs::read_to_string(&masked).unwrap();
    assert!(text.contains('N'), "masked copy has no masked bases");
}

#[test]
fn search_json_stream_parses() {
    if !blast_available() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();

    let element = make_seq(7, 300);
    let mut genome = make_seq(1, 5000);
    genome[1500..1800].copy_from_slice(&element);
    write_fasta(&dir.path().join("genome.fasta"), "chr1", "", &genome);
    write_fasta(&dir.path().join("lib.fasta"), "R1", "SINE/test", &element);

    let output = repfind_cmd()
        .current_dir(dir.path())
        .args([
            "search",
            "--query",
            "genome.fasta",
            "--lib",
            "lib.fasta",
            "--json",
            "--cores",
            "1",
        ])
        .output()
        .expect("run repfind");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!stdout.is_empty());
    for line in stdout.lines() {
        let hit: repfind::Hit = serde_json::from_str(line).unwrap();
        assert_eq!(hit.subject_acc, "chr1");
        assert_eq!(hit.query_acc, "R1");
    }
}
