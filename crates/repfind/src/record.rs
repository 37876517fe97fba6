//! The BLAST hit record shared by every pass of the pipeline.

use serde::{Deserialize, Serialize};

/// A single high-scoring segment pair.
///
/// Query fields refer to the repeat family sequence, subject fields to the
/// genome (or a fragment of it). Coordinates are zero-based half-open.
/// Minus-strand alignments keep BLAST's inverted subject interval; use
/// [`Hit::subject_left`] and [`Hit::subject_right`] for the genomic span.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub query_acc: String,
    pub subject_acc: String,
    pub pct_identity: f64,
    pub align_len: i64,
    pub mismatches: i64,
    pub gap_opens: i64,
    pub query_start: i64,
    pub query_end: i64,
    pub subject_start: i64,
    pub subject_end: i64,
    pub e_value: f64,
    pub bit_score: f64,
    /// +1 when query and subject orientations agree, -1 otherwise.
    pub strand: i8,
    /// Forward-pass BLAST iteration that produced the hit.
    #[serde(default)]
    pub iteration: i64,
    /// Identifier shared by all HSPs of one reciprocal BLAST hit.
    #[serde(default)]
    pub uid: i64,
    /// Aggregate bit score over the HSPs sharing this hit's UID.
    #[serde(default)]
    pub sum_score: f64,
}

impl Hit {
    /// The lesser subject coordinate.
    pub fn subject_left(&self) -> i64 {
        self.subject_start.min(self.subject_end)
    }

    /// The greater subject coordinate.
    pub fn subject_right(&self) -> i64 {
        self.subject_start.max(self.subject_end)
    }
}
