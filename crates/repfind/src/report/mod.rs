//! Feature output over the reverse store: GTF features or a
//! newline-delimited JSON stream, in subject-position order.

use std::collections::HashMap;
use std::io::Write;

use crate::library::RepeatInfo;
use crate::store::Store;
use crate::{Error, Hit, Result};

/// GTF source column value.
pub const SOURCE: &str = "repfind";

/// Streams the store's records as newline-delimited JSON. Store values are
/// already the JSON encoding of the record and are written verbatim.
pub fn write_json<W: Write>(store: &Store, w: &mut W) -> Result<()> {
    for kv in store.iter()? {
        let (_, v) = kv?;
        w.write_all(&v)?;
        writeln!(w)?;
    }
    Ok(())
}

/// Streams the store's records as GTF features with `Repeat`, `UID` and
/// `SumScore` attributes.
pub fn write_gtf<W: Write>(
    store: &Store,
    details: &HashMap<String, RepeatInfo>,
    w: &mut W,
) -> Result<()> {
    for kv in store.iter()? {
        let (_, v) = kv?;
        let hit: Hit =
            serde_json::from_slice(&v).map_err(|e| Error::StoreCorruption(e.to_string()))?;
        write_feature(w, &hit, details)?;
    }
    Ok(())
}

fn write_feature<W: Write>(
    w: &mut W,
    hit: &Hit,
    details: &HashMap<String, RepeatInfo>,
) -> Result<()> {
    let start = hit.subject_left();
    let end = hit.subject_right();
    let strand = if hit.strand < 0 { '-' } else { '+' };
    let info = details.get(&hit.query_acc);
    let class = info
        .map(|i| i.class.as_str())
        .filter(|c| !c.is_empty())
        .unwrap_or("Unknown");
    let tail = info.map(|i| i.length - hit.query_end).unwrap_or(0);
    writeln!(
        w,
        "{}\t{}\trepeat\t{}\t{}\t{}\t{}\t.\tRepeat {} {} {} {} {}; UID {}; SumScore {:.4}",
        hit.subject_acc,
        SOURCE,
        start + 1,
        end,
        hit.bit_score,
        strand,
        hit.query_acc,
        class,
        hit.query_start + 1,
        hit.query_end,
        tail,
        hit.uid,
        hit.sum_score,
    )?;
    Ok(())
}
