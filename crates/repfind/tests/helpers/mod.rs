#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

use repfind::store::{key, Order, Store};
use repfind::Hit;

/// BLAST+ is an external dependency; tests that drive it bail out quietly
/// when it is not installed.
pub fn blast_available() -> bool {
    let probe = |program: &str| {
        Command::new(program)
            .arg("-version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    };
    probe("blastn") && probe("makeblastdb")
}

/// Deterministic random DNA.
pub fn make_seq(seed: u64, len: usize) -> Vec<u8> {
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

/// Deterministic u64 stream for shaping fixtures.
pub fn lcg(state: &mut u64) -> u64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    *state >> 11
}

pub fn write_fasta(path: &Path, records: &[(&str, &str, &[u8])]) -> std::io::Result<()> {
    let mut out = Vec::new();
    for (id, desc, seq) in records {
        let desc = if desc.is_empty() { None } else { Some(*desc) };
        repfind::fasta::write_wrapped(&mut out, id, desc, seq)?;
    }
    std::fs::write(path, out)
}

pub fn hit(
    subject_acc: &str,
    subject_start: i64,
    subject_end: i64,
    query_acc: &str,
    bit_score: f64,
    strand: i8,
) -> Hit {
    Hit {
        query_acc: query_acc.to_string(),
        subject_acc: subject_acc.to_string(),
        query_start: 0,
        query_end: (subject_end - subject_start).abs(),
        subject_start,
        subject_end,
        bit_score,
        strand,
        ..Hit::default()
    }
}

pub fn store_with(dir: &Path, name: &str, order: Order, hits: &[Hit]) -> Store {
    let store = Store::create(dir.join(name), order).unwrap();
    for h in hits {
        store
            .set(&key::marshal(h), &serde_json::to_vec(h).unwrap())
            .unwrap();
    }
    store
}
