use std::path::Path;
use std::sync::Arc;

use log::info;
use parking_lot::RwLock;

use crate::buffer::BufferPool;
use crate::catalog::Catalog;
use crate::common::{Config, Result};
use crate::storage::HeapFile;
use crate::tuple::TupleDesc;
use crate::wal::{LogSink, MemoryLog};

/// Database ties together the pieces of one storage engine instance:
/// configuration, catalog, log and buffer pool.
///
/// Components receive what they need from here instead of reaching for
/// process-wide state, so independent instances can live side by side
/// (one per test, for example).
pub struct Database {
    config: RwLock<Config>,
    catalog: RwLock<Arc<Catalog>>,
    log: Arc<dyn LogSink>,
    buffer_pool: RwLock<Arc<BufferPool>>,
}

impl Database {
    /// Creates a database that keeps its log in memory.
    pub fn new(config: Config) -> Self {
        Self::with_log(config, Arc::new(MemoryLog::new()))
    }

    /// Creates a database writing page images to `log`.
    pub fn with_log(config: Config, log: Arc<dyn LogSink>) -> Self {
        let catalog = Arc::new(Catalog::new());
        let pool = Self::build_pool(&config, config.pool_pages, &catalog, &log);
        Self {
            config: RwLock::new(config),
            catalog: RwLock::new(catalog),
            log,
            buffer_pool: RwLock::new(pool),
        }
    }

    fn build_pool(
        config: &Config,
        capacity: usize,
        catalog: &Arc<Catalog>,
        log: &Arc<dyn LogSink>,
    ) -> Arc<BufferPool> {
        Arc::new(
            BufferPool::new(capacity, Arc::clone(catalog), Arc::clone(log))
                .with_max_lock_wait(config.max_lock_wait),
        )
    }

    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.read().clone()
    }

    pub fn buffer_pool(&self) -> Arc<BufferPool> {
        self.buffer_pool.read().clone()
    }

    pub fn log(&self) -> Arc<dyn LogSink> {
        Arc::clone(&self.log)
    }

    /// Replaces the buffer pool with an empty one of `capacity` pages.
    ///
    /// Holders of the old pool keep using it; its cached pages and locks are
    /// not carried over.
    pub fn reset_buffer_pool(&self, capacity: usize) -> Arc<BufferPool> {
        let pool = Self::build_pool(&self.config.read(), capacity, &self.catalog(), &self.log);
        *self.buffer_pool.write() = Arc::clone(&pool);
        info!("buffer pool reset to {} pages", capacity);
        pool
    }

    /// Starts over with an empty catalog and a fresh buffer pool.
    pub fn reset(&self) {
        let catalog = Arc::new(Catalog::new());
        let config = self.config.read().clone();
        let pool = Self::build_pool(&config, config.pool_pages, &catalog, &self.log);
        *self.catalog.write() = catalog;
        *self.buffer_pool.write() = pool;
        info!("database reset");
    }

    /// Changes the page size of heap files created from now on.
    pub fn set_page_size(&self, page_size: usize) {
        self.config.write().page_size = page_size;
    }

    pub fn reset_page_size(&self) {
        self.config.write().reset_page_size();
    }

    /// Opens the heap file at `path` with the current page size and
    /// registers it in the catalog under `name`.
    pub fn create_heap_file<P: AsRef<Path>>(
        &self,
        path: P,
        name: &str,
        desc: TupleDesc,
    ) -> Result<Arc<HeapFile>> {
        let page_size = self.config.read().page_size;
        let file = Arc::new(HeapFile::open(path, desc, page_size)?);
        self.catalog().add_table(Arc::clone(&file), name, "")?;
        Ok(file)
    }

    /// Loads a schema file into the catalog using the current page size.
    pub fn load_schema<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let page_size = self.config.read().page_size;
        self.catalog().load_schema(path, page_size)?;
        Ok(())
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
