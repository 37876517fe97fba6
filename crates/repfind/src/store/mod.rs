//! Sorted on-disk key/value stores backing the pipeline passes.
//!
//! Each store is a RocksDB database parameterized with one of the two key
//! comparators from [`order`]. Transactions exist purely for write batching:
//! [`Store::begin`] opens a `WriteBatch`, [`Store::commit`] applies it
//! atomically. Reads flush the pending batch first so that iterators observe
//! committed state plus in-transaction writes.

pub mod key;
pub mod order;

use std::cell::RefCell;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use rocksdb::{DBRawIterator, Options, WriteBatch, DB};

use crate::{Error, Result};

/// Sort order of a store, fixed at creation and required again on reopen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Strand, family, subject, position, score: forward and regions stores.
    GroupByQuery,
    /// Strand, subject, position, score: the reverse store.
    BySubjectPosition,
}

impl Order {
    fn name(self) -> &'static str {
        match self {
            Order::GroupByQuery => "group-by-query",
            Order::BySubjectPosition => "by-subject-position",
        }
    }

    fn compare(self) -> fn(&[u8], &[u8]) -> Ordering {
        match self {
            Order::GroupByQuery => order::group_by_query,
            Order::BySubjectPosition => order::by_subject_position,
        }
    }

    fn options(self) -> Options {
        let mut opts = Options::default();
        let cmp = self.compare();
        opts.set_comparator(self.name(), Box::new(move |x: &[u8], y: &[u8]| cmp(x, y)));
        opts
    }
}

/// An ordered key/value store.
pub struct Store {
    db: DB,
    batch: RefCell<Option<WriteBatch>>,
    path: PathBuf,
}

impl Store {
    /// Creates a new store at `path`. Fails if the path already holds one.
    pub fn create(path: impl Into<PathBuf>, order: Order) -> Result<Store> {
        let path = path.into();
        let mut opts = order.options();
        opts.create_if_missing(true);
        opts.set_error_if_exists(true);
        let db = DB::open(&opts, &path)?;
        Ok(Store {
            db,
            batch: RefCell::new(None),
            path,
        })
    }

    /// Opens an existing store. `order` must match the order the store was
    /// created with.
    pub fn open(path: impl Into<PathBuf>, order: Order) -> Result<Store> {
        let path = path.into();
        let mut opts = order.options();
        opts.create_if_missing(false);
        let db = DB::open(&opts, &path)?;
        Ok(Store {
            db,
            batch: RefCell::new(None),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Starts a write batch. Writes between `begin` and [`Store::commit`]
    /// are applied atomically at commit.
    pub fn begin(&self) {
        let mut batch = self.batch.borrow_mut();
        debug_assert!(batch.is_none(), "transaction already open");
        *batch = Some(WriteBatch::default());
    }

    /// Applies the open write batch. A commit with no open batch is a no-op.
    pub fn commit(&self) -> Result<()> {
        if let Some(batch) = self.batch.borrow_mut().take() {
            self.db.write(batch)?;
        }
        Ok(())
    }

    pub fn set(&self, k: &[u8], v: &[u8]) -> Result<()> {
        match self.batch.borrow_mut().as_mut() {
            Some(batch) => batch.put(k, v),
            None => self.db.put(k, v)?,
        }
        Ok(())
    }

    pub fn delete(&self, k: &[u8]) -> Result<()> {
        match self.batch.borrow_mut().as_mut() {
            Some(batch) => batch.delete(k),
            None => self.db.delete(k)?,
        }
        Ok(())
    }

    pub fn get(&self, k: &[u8]) -> Result<Option<Vec<u8>>> {
        self.commit()?;
        Ok(self.db.get(k)?)
    }

    /// Iterates the whole store in comparator order.
    pub fn iter(&self) -> Result<Iter<'_>> {
        self.commit()?;
        let mut raw = self.db.raw_iterator();
        raw.seek_to_first();
        Ok(Iter {
            raw,
            primed: true,
            done: false,
        })
    }

    /// Positions an iterator at the first key >= `k` in comparator order.
    /// The boolean reports whether that key equals `k`.
    pub fn seek(&self, k: &[u8]) -> Result<(Iter<'_>, bool)> {
        self.commit()?;
        let mut raw = self.db.raw_iterator();
        raw.seek(k);
        let exact = raw.valid() && raw.key() == Some(k);
        Ok((
            Iter {
                raw,
                primed: true,
                done: false,
            },
            exact,
        ))
    }

    /// The greatest entry in comparator order, if any.
    pub fn last(&self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        self.commit()?;
        let mut raw = self.db.raw_iterator();
        raw.seek_to_last();
        if !raw.valid() {
            raw.status()?;
            return Ok(None);
        }
        match (raw.key(), raw.value()) {
            (Some(k), Some(v)) => Ok(Some((k.to_vec(), v.to_vec()))),
            _ => Err(Error::StoreCorruption("last entry yielded no key".into())),
        }
    }

    /// Commits any outstanding batch and closes the store.
    pub fn close(self) -> Result<()> {
        self.commit()
    }
}

/// Iterator over store entries in comparator order.
///
/// Entries are copied out of the engine; deletions applied behind an open
/// iterator do not disturb it (it observes the state at creation).
pub struct Iter<'a> {
    raw: DBRawIterator<'a>,
    primed: bool,
    done: bool,
}

impl Iterator for Iter<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.primed {
            self.primed = false;
        } else {
            self.raw.next();
        }
        if !self.raw.valid() {
            self.done = true;
            return match self.raw.status() {
                Ok(()) => None,
                Err(err) => Some(Err(Error::Store(err))),
            };
        }
        match (self.raw.key(), self.raw.value()) {
            (Some(k), Some(v)) => Some(Ok((k.to_vec(), v.to_vec()))),
            _ => {
                self.done = true;
                Some(Err(Error::StoreCorruption(
                    "valid iterator yielded no entry".into(),
                )))
            }
        }
    }
}
