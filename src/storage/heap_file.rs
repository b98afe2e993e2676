use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::buffer::BufferPool;
use crate::common::{PageId, Permissions, QuarryError, Result, TableId, TransactionId};
use crate::tuple::{Tuple, TupleDesc};

use super::disk::DiskManager;
use super::page::{HeapPage, PageRef};

/// HeapFile stores the tuples of one table, unordered, in a file of
/// fixed-size [`HeapPage`]s.
///
/// Reads and writes of whole pages go straight to disk. Tuple-level
/// operations go through the [`BufferPool`] so that every page they touch
/// is locked on behalf of the calling transaction.
pub struct HeapFile {
    disk: DiskManager,
    desc: Arc<TupleDesc>,
    table_id: TableId,
    absolute_path: PathBuf,
    /// Serializes appends so two inserters never claim the same new page number
    append_latch: Mutex<()>,
}

impl HeapFile {
    /// Opens (or creates) the heap file at `path` holding tuples of `desc`.
    /// The table id is the CRC32 of the file's absolute path, so reopening
    /// the same file yields the same id across runs and builds.
    pub fn open<P: AsRef<Path>>(path: P, desc: TupleDesc, page_size: usize) -> Result<Self> {
        let disk = DiskManager::new(&path, page_size)?;
        let absolute_path = fs::canonicalize(&path)?;
        let table_id = Self::table_id_for(&absolute_path);

        Ok(Self {
            disk,
            desc: Arc::new(desc),
            table_id,
            absolute_path,
            append_latch: Mutex::new(()),
        })
    }

    /// Returns the id of the table stored in this file.
    pub fn id(&self) -> TableId {
        self.table_id
    }

    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn path(&self) -> &Path {
        self.disk.path()
    }

    /// Returns the canonical path the table id was derived from.
    pub fn absolute_path(&self) -> &Path {
        &self.absolute_path
    }

    /// Computes the table id of the file at the canonical `absolute_path`.
    pub fn table_id_for(absolute_path: &Path) -> TableId {
        let text = absolute_path.to_string_lossy();
        TableId::new(crc32fast::hash(text.as_bytes()))
    }

    pub fn page_size(&self) -> usize {
        self.disk.page_size()
    }

    /// Returns the number of pages in the file.
    pub fn num_pages(&self) -> Result<u32> {
        self.disk.num_pages()
    }

    /// Returns the underlying disk manager, mostly for I/O statistics.
    pub fn disk_manager(&self) -> &DiskManager {
        &self.disk
    }

    /// Reads a page directly from disk, bypassing the buffer pool.
    pub fn read_page(&self, page_id: PageId) -> Result<HeapPage> {
        if page_id.table_id != self.table_id || page_id.page_no >= self.num_pages()? {
            return Err(QuarryError::PageNotFound(page_id));
        }
        let mut data = HeapPage::empty_page_data(self.page_size());
        self.disk.read_page(page_id.page_no, &mut data)?;
        Ok(HeapPage::new(page_id, Arc::clone(&self.desc), data))
    }

    /// Writes a whole page to its offset in the file.
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        self.disk.write_page(page.page_id().page_no, page.page_data())
    }

    /// Appends a zeroed page to the file and returns its id.
    fn append_empty_page(&self) -> Result<PageId> {
        let _latch = self.append_latch.lock();
        let page_id = PageId::new(self.table_id, self.num_pages()?);
        self.disk
            .write_page(page_id.page_no, &HeapPage::empty_page_data(self.page_size()))?;
        debug!("appended {}", page_id);
        Ok(page_id)
    }

    /// Inserts `tuple` on behalf of `txn` and returns the pages it modified.
    ///
    /// Existing pages are checked in order under a shared lock; the first one
    /// with a free slot is upgraded to exclusive and receives the tuple. When
    /// every page is full a new page is appended. Shared locks on full pages are
    /// given back unless `txn` already held them.
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>> {
        if **tuple.tuple_desc() != *self.desc {
            return Err(QuarryError::SchemaMismatch(format!(
                "tuple is ({}), table holds ({})",
                tuple.tuple_desc(),
                self.desc
            )));
        }

        for page_no in 0..self.num_pages()? {
            let page_id = PageId::new(self.table_id, page_no);
            let held_before = pool.holds_lock(txn, page_id);

            let page = pool.get_page(txn, page_id, Permissions::ReadOnly)?;
            let has_room = page.read().num_empty_slots() > 0;
            if !has_room {
                if !held_before {
                    pool.unsafe_release_page(txn, page_id);
                }
                continue;
            }

            let page = pool.get_page(txn, page_id, Permissions::ReadWrite)?;
            Self::insert_into(&page, txn, tuple)?;
            return Ok(vec![page]);
        }

        loop {
            let page_id = self.append_empty_page()?;
            let page = pool.get_page(txn, page_id, Permissions::ReadWrite)?;
            match Self::insert_into(&page, txn, tuple) {
                // another inserter filled the fresh page first
                Err(QuarryError::PageFull(_)) => continue,
                Err(e) => return Err(e),
                Ok(()) => return Ok(vec![page]),
            }
        }
    }

    fn insert_into(page: &PageRef, txn: TransactionId, tuple: &mut Tuple) -> Result<()> {
        let mut guard = page.write();
        guard.insert_tuple(tuple)?;
        guard.mark_dirty(Some(txn));
        Ok(())
    }

    /// Removes `tuple` from the page its record id names and returns that page.
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageRef>> {
        let record_id = tuple.record_id().ok_or(QuarryError::InvalidRecordId)?;
        if record_id.page_id.table_id != self.table_id {
            return Err(QuarryError::TupleNotFound(record_id));
        }

        let page = pool.get_page(txn, record_id.page_id, Permissions::ReadWrite)?;
        {
            let mut guard = page.write();
            guard.delete_tuple(tuple)?;
            guard.mark_dirty(Some(txn));
        }
        Ok(vec![page])
    }

    /// Returns a lazy scan over every tuple, fetching pages through `pool`.
    pub fn iter<'a>(
        self: &Arc<Self>,
        pool: &'a BufferPool,
        txn: TransactionId,
    ) -> HeapFileIterator<'a> {
        HeapFileIterator {
            file: Arc::clone(self),
            pool,
            txn,
            next_page: 0,
            current: Vec::new().into_iter(),
        }
    }
}

/// Sequential scan of a heap file in ascending page order.
///
/// Pages are fetched one at a time with a shared lock, so a scan never holds
/// more than one page's tuples in memory. Empty pages are skipped.
pub struct HeapFileIterator<'a> {
    file: Arc<HeapFile>,
    pool: &'a BufferPool,
    txn: TransactionId,
    next_page: u32,
    current: std::vec::IntoIter<Tuple>,
}

impl HeapFileIterator<'_> {
    /// Restarts the scan from page 0.
    pub fn rewind(&mut self) {
        self.next_page = 0;
        self.current = Vec::new().into_iter();
    }

    pub fn table_id(&self) -> TableId {
        self.file.id()
    }
}

impl Iterator for HeapFileIterator<'_> {
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(tuple) = self.current.next() {
                return Some(Ok(tuple));
            }

            let num_pages = match self.file.num_pages() {
                Ok(n) => n,
                Err(e) => return Some(Err(e)),
            };
            if self.next_page >= num_pages {
                return None;
            }

            let page_id = PageId::new(self.file.id(), self.next_page);
            self.next_page += 1;
            match self.pool.get_page(self.txn, page_id, Permissions::ReadOnly) {
                Ok(page) => self.current = page.read().tuples().into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
