//! Page-level shared/exclusive locks for two-phase locking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::common::{PageId, Permissions, QuarryError, Result, TransactionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl From<Permissions> for LockMode {
    fn from(perm: Permissions) -> Self {
        match perm {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        }
    }
}

/// A lock granted to one transaction on one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lock {
    pub txn: TransactionId,
    pub mode: LockMode,
}

/// Grants on one page. `retired` is set when the entry has been dropped
/// from the lock table; a request that finds it set starts over.
#[derive(Debug, Default)]
struct EntryState {
    grants: Vec<Lock>,
    retired: bool,
}

/// Lock table entry for a single page: the granted locks plus a condition
/// variable that waiters sleep on until something is released.
#[derive(Debug, Default)]
struct LockEntry {
    state: Mutex<EntryState>,
    released: Condvar,
}

impl LockEntry {
    /// Applies the grant rules to `grants`. Returns whether `txn` now holds
    /// a lock at least as strong as `mode`.
    fn try_grant(grants: &mut Vec<Lock>, txn: TransactionId, mode: LockMode) -> bool {
        match grants.len() {
            0 => {
                grants.push(Lock { txn, mode });
                true
            }
            1 => {
                let held = &mut grants[0];
                if held.txn == txn {
                    // sole holder: upgrade in place, anything else is already covered
                    if held.mode == LockMode::Shared && mode == LockMode::Exclusive {
                        held.mode = LockMode::Exclusive;
                    }
                    true
                } else if held.mode == LockMode::Shared && mode == LockMode::Shared {
                    grants.push(Lock { txn, mode });
                    true
                } else {
                    false
                }
            }
            _ => {
                // several holders are always all shared
                if mode == LockMode::Exclusive {
                    return false;
                }
                if !grants.iter().any(|l| l.txn == txn) {
                    grants.push(Lock { txn, mode });
                }
                true
            }
        }
    }

    /// Drops `txn`'s lock and wakes waiters. Returns true if the entry is
    /// now empty, in which case it is marked retired.
    fn release(&self, txn: TransactionId) -> bool {
        let mut state = self.state.lock();
        let before = state.grants.len();
        state.grants.retain(|l| l.txn != txn);
        if state.grants.len() != before {
            if state.grants.is_empty() {
                state.retired = true;
            }
            self.released.notify_all();
        }
        state.retired
    }
}

/// LockManager tracks which transactions hold which page locks.
///
/// Many readers or a single writer may hold a page. A transaction that is the
/// only reader of a page may upgrade to exclusive in place. There is no
/// deadlock detection: blocked callers give up at a deadline and the owning
/// transaction is expected to abort.
///
/// Pages nobody holds have no entry. Entries are removed under the table
/// mutex, which is always taken before an entry's own mutex.
#[derive(Debug, Default)]
pub struct LockManager {
    table: Mutex<HashMap<PageId, Arc<LockEntry>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, page_id: PageId) -> Arc<LockEntry> {
        let mut table = self.table.lock();
        Arc::clone(table.entry(page_id).or_default())
    }

    fn existing_entry(&self, page_id: PageId) -> Option<Arc<LockEntry>> {
        self.table.lock().get(&page_id).cloned()
    }

    /// Attempts to grant `mode` on `page_id` to `txn` without blocking.
    pub fn acquire(&self, txn: TransactionId, page_id: PageId, mode: LockMode) -> bool {
        loop {
            let entry = self.entry(page_id);
            let mut state = entry.state.lock();
            if state.retired {
                continue;
            }
            return LockEntry::try_grant(&mut state.grants, txn, mode);
        }
    }

    /// Blocks until `mode` on `page_id` is granted to `txn` or `deadline`
    /// passes. A timed-out request leaves the lock table unchanged.
    pub fn acquire_until(
        &self,
        txn: TransactionId,
        page_id: PageId,
        mode: LockMode,
        deadline: Instant,
    ) -> Result<()> {
        'fetch: loop {
            let entry = self.entry(page_id);
            let mut state = entry.state.lock();
            loop {
                if state.retired {
                    continue 'fetch;
                }
                if LockEntry::try_grant(&mut state.grants, txn, mode) {
                    return Ok(());
                }
                if entry.released.wait_until(&mut state, deadline).timed_out() {
                    if !state.retired && LockEntry::try_grant(&mut state.grants, txn, mode) {
                        return Ok(());
                    }
                    return Err(QuarryError::TransactionAborted { txn, page_id });
                }
            }
        }
    }

    /// Releases whatever lock `txn` holds on `page_id`.
    pub fn release(&self, txn: TransactionId, page_id: PageId) {
        let mut table = self.table.lock();
        let emptied = match table.get(&page_id) {
            Some(entry) => entry.release(txn),
            None => false,
        };
        if emptied {
            table.remove(&page_id);
        }
    }

    /// Releases every lock held by `txn`.
    pub fn release_all(&self, txn: TransactionId) {
        let mut table = self.table.lock();
        table.retain(|_, entry| !entry.release(txn));
    }

    /// Returns whether `txn` holds any lock on `page_id`.
    pub fn holds(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.lock_mode(txn, page_id).is_some()
    }

    /// Returns the mode `txn` holds on `page_id`, if any.
    pub fn lock_mode(&self, txn: TransactionId, page_id: PageId) -> Option<LockMode> {
        let entry = self.existing_entry(page_id)?;
        let state = entry.state.lock();
        state.grants.iter().find(|l| l.txn == txn).map(|l| l.mode)
    }

    /// Returns every page `txn` holds a lock on.
    pub fn pages_locked_by(&self, txn: TransactionId) -> Vec<PageId> {
        let table = self.table.lock();
        let mut pages: Vec<PageId> = table
            .iter()
            .filter(|(_, entry)| entry.state.lock().grants.iter().any(|l| l.txn == txn))
            .map(|(page_id, _)| *page_id)
            .collect();
        pages.sort();
        pages
    }

    /// Returns the number of pages somebody holds a lock on.
    pub fn locked_page_count(&self) -> usize {
        self.table.lock().len()
    }
}
