use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process::exit;

use anyhow::Result;
use serde::Serialize;

use repfind::store::{key, Order, Store};

/// The regions store holds counts keyed by region span; hit stores hold
/// JSON records.
#[derive(Serialize)]
struct Region {
    subject_acc: String,
    subject_left: i64,
    subject_right: i64,
    query_acc: String,
    strand: i8,
    count: u64,
}

/// Dumps one of the pipeline stores left by `search --work` (or named by
/// `--recover`) as a JSON stream on stdout. Hit store values are emitted
/// verbatim; regions are decoded from their keys.
pub fn run(db: &Path) -> Result<()> {
    let base = db.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let order = match base {
        "forward.db" | "regions.db" => Order::GroupByQuery,
        "reverse.db" => Order::BySubjectPosition,
        _ => {
            eprintln!("repfind: store basename must be one of forward.db, regions.db or reverse.db");
            exit(2);
        }
    };
    let store = Store::open(db, order)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for kv in store.iter()? {
        let (k, v) = kv?;
        if base == "regions.db" {
            let decoded = key::unmarshal(&k)?;
            let region = Region {
                subject_acc: decoded.subject_acc,
                subject_left: decoded.subject_left,
                subject_right: decoded.subject_right,
                query_acc: decoded.query_acc,
                strand: decoded.strand,
                count: key::unmarshal_count(&v)?,
            };
            serde_json::to_writer(&mut out, &region)?;
        } else {
            out.write_all(&v)?;
        }
        writeln!(&mut out)?;
    }
    out.flush()?;
    Ok(())
}
