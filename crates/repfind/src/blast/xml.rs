//! Streaming decoder for blastn XML output (`-outfmt` 5).
//!
//! Only the elements the reciprocal pass consumes are retained: iteration
//! query ids, hit definition lines and the per-HSP scores and coordinates.
//! Coordinates are left exactly as reported (one-based, minus-strand hits
//! inverted); the reciprocal driver performs the translation.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Output {
    pub iterations: Vec<Iteration>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Iteration {
    pub query_id: Option<String>,
    pub query_def: Option<String>,
    pub hits: Vec<XmlHit>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlHit {
    /// The full definition line of the database sequence that was hit.
    pub def: String,
    pub hsps: Vec<Hsp>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hsp {
    pub bit_score: f64,
    pub score: f64,
    pub e_value: f64,
    pub query_from: i64,
    pub query_to: i64,
    pub hit_from: i64,
    pub hit_to: i64,
    pub identity: i64,
    pub gaps: i64,
    pub align_len: i64,
}

/// Decodes one blastn XML document.
pub fn parse(text: &str) -> Result<Output> {
    let mut reader = Reader::from_str(text);

    let mut output = Output::default();
    let mut iteration = Iteration::default();
    let mut hit = XmlHit::default();
    let mut hsp = Hsp::default();
    let mut text_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => text_buf.clear(),
            Ok(Event::Text(ref e)) => {
                if let Ok(t) = e.unescape() {
                    text_buf.push_str(&t);
                }
            }
            Ok(Event::End(ref e)) => {
                let value = text_buf.trim();
                match e.name().as_ref() {
                    b"Iteration_query-ID" => iteration.query_id = Some(value.to_string()),
                    b"Iteration_query-def" => iteration.query_def = Some(value.to_string()),
                    b"Hit_def" => hit.def = value.to_string(),
                    b"Hsp_bit-score" => hsp.bit_score = number(value)?,
                    b"Hsp_score" => hsp.score = number(value)?,
                    b"Hsp_evalue" => hsp.e_value = number(value)?,
                    b"Hsp_query-from" => hsp.query_from = integer(value)?,
                    b"Hsp_query-to" => hsp.query_to = integer(value)?,
                    b"Hsp_hit-from" => hsp.hit_from = integer(value)?,
                    b"Hsp_hit-to" => hsp.hit_to = integer(value)?,
                    b"Hsp_identity" => hsp.identity = integer(value)?,
                    b"Hsp_gaps" => hsp.gaps = integer(value)?,
                    b"Hsp_align-len" => hsp.align_len = integer(value)?,
                    b"Hsp" => hit.hsps.push(std::mem::take(&mut hsp)),
                    b"Hit" => iteration.hits.push(std::mem::take(&mut hit)),
                    b"Iteration" => output.iterations.push(std::mem::take(&mut iteration)),
                    _ => {}
                }
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(Error::ParseFormat(format!("BLAST XML: {err}"))),
        }
    }
    Ok(output)
}

fn number(s: &str) -> Result<f64> {
    s.parse()
        .map_err(|e| Error::ParseFormat(format!("BLAST XML value {s:?}: {e}")))
}

fn integer(s: &str) -> Result<i64> {
    s.parse()
        .map_err(|e| Error::ParseFormat(format!("BLAST XML value {s:?}: {e}")))
}
