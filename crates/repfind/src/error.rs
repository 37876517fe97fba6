use std::path::PathBuf;
use std::process::ExitStatus;

/// Crate-wide error type.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store error: {0}")]
    Store(#[from] rocksdb::Error),
    #[error("invalid format: {0}")]
    ParseFormat(String),
    #[error("duplicate sequence identifier {0:?}")]
    DuplicateSeqId(String),
    #[error("unknown fragment {0:?}")]
    UnknownFragment(String),
    #[error("unexpected BLAST query id {got:?}, want {want:?}")]
    UnexpectedBlastQueryId { got: String, want: String },
    #[error("strand mismatch: HSP strand {got:+} does not match region strand {want:+}")]
    StrandMismatch { got: i8, want: i8 },
    #[error("{program} exited with {status}")]
    ExternalCommand { program: String, status: ExitStatus },
    #[error("store corruption: {0}")]
    StoreCorruption(String),
    #[error("no records in {}", .0.display())]
    Empty(PathBuf),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ParseFormat(err.to_string())
    }
}
