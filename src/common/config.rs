use std::time::Duration;

/// Default size of a page in bytes (4 KB)
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default number of pages the buffer pool caches
pub const DEFAULT_POOL_PAGES: usize = 50;

/// Maximum number of bytes stored for a string field
pub const STRING_LEN: usize = 128;

/// Upper bound of the randomized wait budget of a single lock request
pub const DEFAULT_MAX_LOCK_WAIT: Duration = Duration::from_millis(2000);

/// Lower bound of the randomized wait budget, so a request always gets a real chance
pub const MIN_LOCK_WAIT: Duration = Duration::from_millis(50);

/// Process-wide storage settings.
///
/// The defaults are the production values; tests override them and return
/// to the defaults with [`Config::reset_page_size`] or `Config::default()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Bytes per page, including the slot header
    pub page_size: usize,
    /// Number of pages the buffer pool may hold
    pub pool_pages: usize,
    /// Upper bound of the wait budget drawn for each `get_page` call
    pub max_lock_wait: Duration,
}

impl Config {
    pub fn new(page_size: usize, pool_pages: usize) -> Self {
        Self {
            page_size,
            pool_pages,
            max_lock_wait: DEFAULT_MAX_LOCK_WAIT,
        }
    }

    pub fn with_max_lock_wait(mut self, max_lock_wait: Duration) -> Self {
        self.max_lock_wait = max_lock_wait;
        self
    }

    /// Restores the default page size.
    pub fn reset_page_size(&mut self) {
        self.page_size = DEFAULT_PAGE_SIZE;
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, DEFAULT_POOL_PAGES)
    }
}
