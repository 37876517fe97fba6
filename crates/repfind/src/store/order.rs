//! Total orders over raw key bytes.
//!
//! Both comparators return `Equal` only for byte-equal keys. Scores are
//! compared with `f64::total_cmp` so that byte-distinct keys always order,
//! and a raw byte comparison backs the cascade for keys that cannot be
//! decoded.

use std::cmp::Ordering;

use super::key;

/// Orders by strand, repeat family, subject name, subject position and
/// descending bit score: the order of the forward and regions stores.
pub fn group_by_query(x: &[u8], y: &[u8]) -> Ordering {
    if x == y {
        return Ordering::Equal;
    }
    let (rx, ry) = match (key::decode(x), key::decode(y)) {
        (Some(rx), Some(ry)) => (rx, ry),
        _ => return x.cmp(y),
    };

    // Separate strands, (+) first.
    match ry.strand.cmp(&rx.strand) {
        Ordering::Equal => {}
        ord => return ord,
    }
    // Group elements of the same repeat family.
    match rx.query_acc.cmp(ry.query_acc) {
        Ordering::Equal => {}
        ord => return ord,
    }
    // Sort by left position, with higher scoring matches first.
    match rx.subject_acc.cmp(ry.subject_acc) {
        Ordering::Equal => {}
        ord => return ord,
    }
    match rx.subject_left.cmp(&ry.subject_left) {
        Ordering::Equal => {}
        ord => return ord,
    }
    match rx.subject_right.cmp(&ry.subject_right) {
        Ordering::Equal => {}
        ord => return ord,
    }
    match ry.bit_score.total_cmp(&rx.bit_score) {
        Ordering::Equal => {}
        ord => return ord,
    }
    // Query coordinates disambiguate the remainder.
    match rx.query_start.cmp(&ry.query_start) {
        Ordering::Equal => {}
        ord => return ord,
    }
    match rx.query_end.cmp(&ry.query_end) {
        Ordering::Equal => x.cmp(y),
        ord => ord,
    }
}

/// Orders by strand, subject name, subject position (longer spans first) and
/// descending bit score: the order of the reverse store.
pub fn by_subject_position(x: &[u8], y: &[u8]) -> Ordering {
    if x == y {
        return Ordering::Equal;
    }
    let (rx, ry) = match (key::decode(x), key::decode(y)) {
        (Some(rx), Some(ry)) => (rx, ry),
        _ => return x.cmp(y),
    };

    // Separate strands, (+) first.
    match ry.strand.cmp(&rx.strand) {
        Ordering::Equal => {}
        ord => return ord,
    }
    // Sort by left position, longer repeats first, and with higher scoring
    // matches first.
    match rx.subject_acc.cmp(ry.subject_acc) {
        Ordering::Equal => {}
        ord => return ord,
    }
    match rx.subject_left.cmp(&ry.subject_left) {
        Ordering::Equal => {}
        ord => return ord,
    }
    match ry.subject_right.cmp(&rx.subject_right) {
        Ordering::Equal => {}
        ord => return ord,
    }
    match ry.bit_score.total_cmp(&rx.bit_score) {
        Ordering::Equal => {}
        ord => return ord,
    }
    // Query coordinates disambiguate the remainder.
    match rx.query_acc.cmp(ry.query_acc) {
        Ordering::Equal => {}
        ord => return ord,
    }
    match rx.query_start.cmp(&ry.query_start) {
        Ordering::Equal => {}
        ord => return ord,
    }
    match rx.query_end.cmp(&ry.query_end) {
        Ordering::Equal => x.cmp(y),
        ord => ord,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Hit;
    use crate::store::key::marshal;

    fn hit(
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

    fn sample_keys() -> Vec<Vec<u8>> {
        vec![
            marshal(&hit("chr1", 100, 200, "L1", 50.0, 1)),
            marshal(&hit("chr1", 100, 200, "L1", 40.0, 1)),
            marshal(&hit("chr1", 100, 250, "L1", 50.0, 1)),
            marshal(&hit("chr1", 300, 400, "L1", 50.0, 1)),
            marshal(&hit("chr2", 100, 200, "L1", 50.0, 1)),
            marshal(&hit("chr1", 100, 200, "Alu", 50.0, 1)),
            marshal(&hit("chr1", 200, 100, "L1", 50.0, -1)),
            marshal(&hit("chr1", 100, 200, "L1", 50.0, -1)),
        ]
    }

    // Deterministic shuffle; the crate carries no RNG dependency.
    fn shuffle(keys: &mut [Vec<u8>], mut state: u64) {
        for i in (1..keys.len()).rev() {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let j = (state >> 33) as usize % (i + 1);
            keys.swap(i, j);
        }
    }

    #[test]
    fn group_by_query_cascade() {
        let plus = marshal(&hit("chr1", 100, 200, "L1", 50.0, 1));
        let minus = marshal(&hit("chr1", 100, 200, "L1", 50.0, -1));
        assert_eq!(group_by_query(&plus, &minus), Ordering::Less);

        let alu = marshal(&hit("chr1", 100, 200, "Alu", 50.0, 1));
        assert_eq!(group_by_query(&alu, &plus), Ordering::Less);

        let high = marshal(&hit("chr1", 100, 200, "L1", 90.0, 1));
        assert_eq!(group_by_query(&high, &plus), Ordering::Less);

        let downstream = marshal(&hit("chr1", 150, 200, "L1", 90.0, 1));
        assert_eq!(group_by_query(&plus, &downstream), Ordering::Less);
    }

    #[test]
    fn by_subject_position_prefers_longer_spans() {
        let long = marshal(&hit("chr1", 100, 300, "L1", 10.0, 1));
        let short = marshal(&hit("chr1", 100, 200, "L1", 90.0, 1));
        assert_eq!(by_subject_position(&long, &short), Ordering::Less);

        let family_a = marshal(&hit("chr1", 100, 200, "Alu", 50.0, 1));
        let family_b = marshal(&hit("chr1", 100, 200, "L1", 50.0, 1));
        assert_eq!(by_subject_position(&family_a, &family_b), Ordering::Less);
    }

    #[test]
    fn totality_on_distinct_keys() {
        let keys = sample_keys();
        for (i, x) in keys.iter().enumerate() {
            for (j, y) in keys.iter().enumerate() {
                for cmp in [group_by_query, by_subject_position] {
                    let ord = cmp(x, y);
                    if i == j {
                        assert_eq!(ord, Ordering::Equal);
                    } else {
                        assert_ne!(ord, Ordering::Equal, "keys {i} and {j} tied");
                        assert_eq!(ord, cmp(y, x).reverse());
                    }
                }
            }
        }
    }

    #[test]
    fn sorting_is_idempotent_under_permutation() {
        for cmp in [group_by_query, by_subject_position] {
            let mut reference = sample_keys();
            reference.sort_by(|a, b| cmp(a, b));
            for seed in 1..8u64 {
                let mut keys = sample_keys();
                shuffle(&mut keys, seed);
                keys.sort_by(|a, b| cmp(a, b));
                assert_eq!(keys, reference);
                keys.sort_by(|a, b| cmp(a, b));
                assert_eq!(keys, reference);
            }
        }
    }
}
