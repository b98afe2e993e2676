use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use parking_lot::{Mutex, RwLock};
use rand::Rng;

use crate::catalog::Catalog;
use crate::common::{
    PageId, Permissions, QuarryError, Result, TableId, TransactionId, DEFAULT_MAX_LOCK_WAIT,
    MIN_LOCK_WAIT,
};
use crate::storage::page::PageRef;
use crate::transaction::LockManager;
use crate::tuple::Tuple;
use crate::wal::LogSink;

use super::LruCache;

/// BufferPool caches heap pages in memory and mediates every page access of
/// a transaction through the lock manager.
///
/// The pool follows a NO-STEAL policy: a page dirtied by an uncommitted
/// transaction is never written to its heap file. Eviction therefore only
/// ever drops clean pages, and a pool full of dirty pages refuses new ones
/// with [`QuarryError::BufferPoolFull`].
///
/// Committing forces the log record of every page the transaction dirtied
/// before writing that page (FORCE). Aborting throws the dirty copies away.
///
/// Lock order is cache mutex before page latch; the cache mutex is never
/// acquired while a page latch is held, and never held across a lock wait.
pub struct BufferPool {
    capacity: usize,
    max_lock_wait: Duration,
    cache: Mutex<LruCache<PageId, PageRef>>,
    lock_manager: LockManager,
    catalog: Arc<Catalog>,
    log: Arc<dyn LogSink>,
}

impl BufferPool {
    /// Creates a pool holding at most `capacity` pages of the tables in `catalog`.
    pub fn new(capacity: usize, catalog: Arc<Catalog>, log: Arc<dyn LogSink>) -> Self {
        Self {
            capacity,
            max_lock_wait: DEFAULT_MAX_LOCK_WAIT,
            cache: Mutex::new(LruCache::new()),
            lock_manager: LockManager::new(),
            catalog,
            log,
        }
    }

    /// Sets the upper bound of the wait budget drawn for each lock request.
    pub fn with_max_lock_wait(mut self, max_lock_wait: Duration) -> Self {
        self.max_lock_wait = max_lock_wait;
        self
    }

    fn lock_budget(&self) -> Duration {
        let min = MIN_LOCK_WAIT.as_millis() as u64;
        let max = self.max_lock_wait.as_millis() as u64;
        if max <= min {
            return self.max_lock_wait;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    /// Returns the page `page_id` once `txn` holds a lock matching `perm` on it.
    ///
    /// Waits for the lock up to a randomly drawn budget; when it expires the
    /// call fails with [`QuarryError::TransactionAborted`] and nothing has
    /// changed. A resident page is returned directly, otherwise it is read
    /// from its heap file, evicting a clean page first if the pool is full.
    pub fn get_page(
        &self,
        txn: TransactionId,
        page_id: PageId,
        perm: Permissions,
    ) -> Result<PageRef> {
        let deadline = Instant::now() + self.lock_budget();
        if let Err(e) = self
            .lock_manager
            .acquire_until(txn, page_id, perm.into(), deadline)
        {
            warn!("{} gave up waiting for {:?} on {}", txn, perm, page_id);
            return Err(e);
        }

        let mut cache = self.cache.lock();
        if let Some(page) = cache.get(&page_id) {
            return Ok(Arc::clone(page));
        }

        let file = self.catalog.database_file(page_id.table_id)?;
        if cache.len() >= self.capacity {
            Self::evict_from(&mut cache)?;
        }
        let page = Arc::new(RwLock::new(file.read_page(page_id)?));
        cache.put(page_id, Arc::clone(&page));
        debug!("{} loaded {}", txn, page_id);
        Ok(page)
    }

    /// Drops the least recently used clean page from the pool.
    pub fn evict_page(&self) -> Result<()> {
        Self::evict_from(&mut self.cache.lock())
    }

    /// Pages latched for writing are skipped: they are about to become dirty.
    fn evict_from(cache: &mut LruCache<PageId, PageRef>) -> Result<()> {
        let victim = cache
            .iter_lru()
            .find(|(_, page)| page.try_read().map_or(false, |p| !p.is_dirty()))
            .map(|(page_id, _)| *page_id);

        match victim {
            Some(page_id) => {
                cache.remove(&page_id);
                debug!("evicted {}", page_id);
                Ok(())
            }
            None => Err(QuarryError::BufferPoolFull),
        }
    }

    /// Puts a page into the pool unless it is already resident.
    fn install(&self, page: &PageRef) -> Result<()> {
        let page_id = page.read().page_id();
        let mut cache = self.cache.lock();
        if cache.contains(&page_id) {
            cache.get(&page_id);
            return Ok(());
        }
        if cache.len() >= self.capacity {
            Self::evict_from(&mut cache)?;
        }
        cache.put(page_id, Arc::clone(page));
        Ok(())
    }

    /// Releases the lock `txn` holds on `page_id` before the transaction ends.
    ///
    /// This breaks two-phase locking; it is only safe for pages the
    /// transaction has looked at but not modified.
    pub fn unsafe_release_page(&self, txn: TransactionId, page_id: PageId) {
        self.lock_manager.release(txn, page_id);
    }

    /// Returns true if `txn` holds any lock on `page_id`.
    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds(txn, page_id)
    }

    /// Inserts `tuple` into table `table_id` on behalf of `txn`.
    /// On success the tuple carries its new record id.
    pub fn insert_tuple(
        &self,
        txn: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<()> {
        let file = self.catalog.database_file(table_id)?;
        let pages = file.insert_tuple(self, txn, tuple)?;
        self.adopt_dirty(txn, &pages)
    }

    /// Deletes `tuple`, located by its record id, on behalf of `txn`.
    pub fn delete_tuple(&self, txn: TransactionId, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(QuarryError::InvalidRecordId)?;
        let file = self.catalog.database_file(record_id.page_id.table_id)?;
        let pages = file.delete_tuple(self, txn, tuple)?;
        self.adopt_dirty(txn, &pages)
    }

    fn adopt_dirty(&self, txn: TransactionId, pages: &[PageRef]) -> Result<()> {
        for page in pages {
            page.write().mark_dirty(Some(txn));
            self.install(page)?;
        }
        Ok(())
    }

    /// Ends `txn`. A commit writes back every page it dirtied, an abort
    /// restores them from disk.
    ///
    /// A commit that fails part way restores the pages it did not get to
    /// write. Locks are released once no page dirtied by `txn` is left in the
    /// pool; otherwise they stay held until a later abort cleans up.
    pub fn transaction_complete(&self, txn: TransactionId, commit: bool) -> Result<()> {
        let outcome = if commit {
            self.flush_pages(txn)
        } else {
            self.restore_pages(txn)
        };

        if commit && outcome.is_err() {
            if let Err(e) = self.restore_pages(txn) {
                warn!("{} could not roll back after a failed commit: {}", txn, e);
            }
        }

        if self.pages_dirtied_by(txn).is_empty() {
            self.lock_manager.release_all(txn);
        } else {
            warn!("{} keeps its locks, dirty pages remain", txn);
        }

        match &outcome {
            Ok(()) => debug!("{} {}", txn, if commit { "committed" } else { "aborted" }),
            Err(e) => warn!("{} failed to complete: {}", txn, e),
        }
        outcome
    }

    /// Resident pages dirtied by `txn`, least recently used first.
    fn pages_dirtied_by(&self, txn: TransactionId) -> Vec<PageRef> {
        self.resident_pages()
            .into_iter()
            .filter(|page| page.read().dirtier() == Some(txn))
            .collect()
    }

    /// Snapshot of the resident pages, least recently used first.
    fn resident_pages(&self) -> Vec<PageRef> {
        let cache = self.cache.lock();
        cache.iter_lru().map(|(_, page)| Arc::clone(page)).collect()
    }

    /// Swaps each page dirtied by `txn` for a clean copy read from disk.
    /// The swap keeps the key, so the pool never changes size.
    fn restore_pages(&self, txn: TransactionId) -> Result<()> {
        for page in self.pages_dirtied_by(txn) {
            let page_id = page.read().page_id();
            let file = self.catalog.database_file(page_id.table_id)?;
            let clean = Arc::new(RwLock::new(file.read_page(page_id)?));

            let mut cache = self.cache.lock();
            if cache.peek(&page_id).map_or(false, |p| Arc::ptr_eq(p, &page)) {
                cache.put(page_id, clean);
                debug!("{} restored {}", txn, page_id);
            }
        }
        Ok(())
    }

    /// Logs and writes one page if it is dirty, then marks it clean.
    fn write_back(&self, page: &PageRef) -> Result<()> {
        let mut guard = page.write();
        let Some(dirtier) = guard.dirtier() else {
            return Ok(());
        };

        let file = self.catalog.database_file(guard.page_id().table_id)?;
        let before = guard.before_image();
        self.log.write(dirtier, &before, &guard)?;
        self.log.force()?;
        file.write_page(&guard)?;
        guard.mark_dirty(None);
        debug!("flushed {} for {}", guard.page_id(), dirtier);
        Ok(())
    }

    /// Writes every dirty page `txn` left in the pool.
    pub fn flush_pages(&self, txn: TransactionId) -> Result<()> {
        for page in self.pages_dirtied_by(txn) {
            self.write_back(&page)?;
        }
        Ok(())
    }

    /// Writes page `page_id` if it is resident and dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let page = self.cache.lock().peek(&page_id).cloned();
        match page {
            Some(page) => self.write_back(&page),
            None => Ok(()),
        }
    }

    /// Writes every dirty page in the pool, whoever dirtied it.
    ///
    /// This breaks NO-STEAL for running transactions and exists for
    /// shutdown and tests.
    pub fn flush_all_pages(&self) -> Result<()> {
        for page in self.resident_pages() {
            self.write_back(&page)?;
        }
        Ok(())
    }

    /// Drops page `page_id` from the pool without writing it.
    pub fn discard_page(&self, page_id: PageId) {
        self.cache.lock().remove(&page_id);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of resident pages.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.cache.lock().contains(&page_id)
    }

    /// Returns the resident page ids, least recently used first.
    pub fn cached_page_ids(&self) -> Vec<PageId> {
        self.cache.lock().keys_lru()
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }
}
