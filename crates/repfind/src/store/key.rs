//! Binary key codec for the hit stores.
//!
//! Keys are big-endian with no padding:
//!
//! ```text
//! u64 len | subject_acc | i64 subject_left | i64 subject_right |
//! u64 len | query_acc   | i64 query_start  | i64 query_end     |
//! f64 bit_score (raw bits) | i8 strand
//! ```
//!
//! Marshalling canonicalizes the subject interval: when a minus-strand
//! alignment reports subject start > end, the subject coordinates are
//! swapped and so are the query coordinates. The query swap keeps keys
//! distinct for symmetric matches in opposite orientations while the
//! record value preserves the original orientation.

use crate::{Error, Hit, Result};

/// The decoded form of a store key.
#[derive(Debug, Clone, PartialEq)]
pub struct HitKey {
    pub subject_acc: String,
    pub subject_left: i64,
    pub subject_right: i64,
    pub query_acc: String,
    pub query_start: i64,
    pub query_end: i64,
    pub bit_score: f64,
    pub strand: i8,
}

impl HitKey {
    /// Encodes the key fields as stored. The subject interval must already
    /// be canonical (`subject_left <= subject_right`).
    pub fn marshal(&self) -> Vec<u8> {
        encode(
            self.subject_acc.as_bytes(),
            self.subject_left,
            self.subject_right,
            self.query_acc.as_bytes(),
            self.query_start,
            self.query_end,
            self.bit_score,
            self.strand,
        )
    }
}

/// Marshals the key of a hit record, applying the canonicalization rule.
pub fn marshal(r: &Hit) -> Vec<u8> {
    let (left, right) = (r.subject_start, r.subject_end);
    let (left, right, query_start, query_end) = if right < left {
        (right, left, r.query_end, r.query_start)
    } else {
        (left, right, r.query_start, r.query_end)
    };
    encode(
        r.subject_acc.as_bytes(),
        left,
        right,
        r.query_acc.as_bytes(),
        query_start,
        query_end,
        r.bit_score,
        r.strand,
    )
}

/// Decodes a stored key. The canonicalization applied by [`marshal`] is not
/// reversed; the stored key is the canonical form.
pub fn unmarshal(data: &[u8]) -> Result<HitKey> {
    let raw = decode(data).ok_or_else(|| Error::StoreCorruption(format!("truncated key of {} bytes", data.len())))?;
    let subject_acc = String::from_utf8(raw.subject_acc.to_vec())
        .map_err(|e| Error::StoreCorruption(e.to_string()))?;
    let query_acc = String::from_utf8(raw.query_acc.to_vec())
        .map_err(|e| Error::StoreCorruption(e.to_string()))?;
    Ok(HitKey {
        subject_acc,
        subject_left: raw.subject_left,
        subject_right: raw.subject_right,
        query_acc,
        query_start: raw.query_start,
        query_end: raw.query_end,
        bit_score: raw.bit_score,
        strand: raw.strand,
    })
}

/// Encodes a region member count as stored in the regions store.
pub fn marshal_count(n: u64) -> [u8; 8] {
    n.to_be_bytes()
}

/// Decodes a region member count.
pub fn unmarshal_count(data: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = data
        .try_into()
        .map_err(|_| Error::StoreCorruption(format!("count value of {} bytes", data.len())))?;
    Ok(u64::from_be_bytes(bytes))
}

#[allow(clippy::too_many_arguments)]
fn encode(
    subject_acc: &[u8],
    subject_left: i64,
    subject_right: i64,
    query_acc: &[u8],
    query_start: i64,
    query_end: i64,
    bit_score: f64,
    strand: i8,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 * 7 + 1 + subject_acc.len() + query_acc.len());
    buf.extend_from_slice(&(subject_acc.len() as u64).to_be_bytes());
    buf.extend_from_slice(subject_acc);
    buf.extend_from_slice(&subject_left.to_be_bytes());
    buf.extend_from_slice(&subject_right.to_be_bytes());
    buf.extend_from_slice(&(query_acc.len() as u64).to_be_bytes());
    buf.extend_from_slice(query_acc);
    buf.extend_from_slice(&query_start.to_be_bytes());
    buf.extend_from_slice(&query_end.to_be_bytes());
    buf.extend_from_slice(&bit_score.to_bits().to_be_bytes());
    buf.push(strand as u8);
    buf
}

/// A borrowed view of a key, used by the comparators on every compare.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawKey<'a> {
    pub subject_acc: &'a [u8],
    pub subject_left: i64,
    pub subject_right: i64,
    pub query_acc: &'a [u8],
    pub query_start: i64,
    pub query_end: i64,
    pub bit_score: f64,
    pub strand: i8,
}

pub(crate) fn decode(data: &[u8]) -> Option<RawKey<'_>> {
    let mut cur = Cursor(data);
    let subject_acc = cur.prefixed()?;
    let subject_left = cur.i64()?;
    let subject_right = cur.i64()?;
    let query_acc = cur.prefixed()?;
    let query_start = cur.i64()?;
    let query_end = cur.i64()?;
    let bit_score = f64::from_bits(cur.u64()?);
    let strand = cur.take(1)?[0] as i8;
    if !cur.0.is_empty() {
        return None;
    }
    Some(RawKey {
        subject_acc,
        subject_left,
        subject_right,
        query_acc,
        query_start,
        query_end,
        bit_score,
        strand,
    })
}

struct Cursor<'a>(&'a [u8]);

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.0.len() < n {
            return None;
        }
        let (head, tail) = self.0.split_at(n);
        self.0 = tail;
        Some(head)
    }

    fn u64(&mut self) -> Option<u64> {
        self.take(8).map(|b| u64::from_be_bytes(b.try_into().unwrap()))
    }

    fn i64(&mut self) -> Option<i64> {
        self.take(8).map(|b| i64::from_be_bytes(b.try_into().unwrap()))
    }

    fn prefixed(&mut self) -> Option<&'a [u8]> {
        let n = self.u64()?;
        self.take(usize::try_from(n).ok()?)
    }
}
