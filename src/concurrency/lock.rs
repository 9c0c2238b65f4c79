//! Page-level lock management.
//!
//! Locks follow strict two-phase locking: once granted, a lock is held until
//! the owning transaction completes and calls [`LockManager::release_all`].
//! A request that has to wait records wait-for edges; if the new edges close
//! a cycle the requester is aborted instead of blocking.

use crate::error::{DbError, DbResult};
use crate::storage::page::PageId;
use crate::transaction::TransactionId;
use log::{debug, trace};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Lock modes supported by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared lock for read operations.
    Shared,
    /// Exclusive lock for write operations.
    Exclusive,
}

impl LockMode {
    /// Checks if this lock mode is compatible with another.
    pub fn is_compatible_with(&self, other: &LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }
}

#[derive(Debug)]
struct LockEntry {
    mode: LockMode,
    holders: HashSet<TransactionId>,
}

#[derive(Debug, Default)]
struct LockTable {
    entries: HashMap<PageId, LockEntry>,
    held: HashMap<TransactionId, HashSet<PageId>>,
    /// Wait-for graph: waiter -> transactions it is blocked on.
    waits_for: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl LockTable {
    /// Grant the lock if possible, otherwise return the blocking holders.
    fn try_grant(
        &mut self,
        txn: TransactionId,
        page_id: PageId,
        mode: LockMode,
    ) -> Result<(), HashSet<TransactionId>> {
        let entry = self.entries.entry(page_id).or_insert_with(|| LockEntry {
            mode,
            holders: HashSet::new(),
        });

        if entry.holders.is_empty() {
            entry.mode = mode;
            entry.holders.insert(txn);
        } else if entry.holders.contains(&txn) {
            if mode == LockMode::Exclusive && entry.mode == LockMode::Shared {
                if entry.holders.len() > 1 {
                    return Err(entry.holders.iter().copied().filter(|h| *h != txn).collect());
                }
                // Sole reader upgrades in place
                entry.mode = LockMode::Exclusive;
            }
        } else if entry.mode.is_compatible_with(&mode) {
            entry.holders.insert(txn);
        } else {
            return Err(entry.holders.clone());
        }

        self.held.entry(txn).or_default().insert(page_id);
        Ok(())
    }

    /// Whether `start` can reach itself through the wait-for graph.
    fn in_cycle(&self, start: TransactionId) -> bool {
        let mut visited = HashSet::new();
        let mut stack: Vec<TransactionId> = self
            .waits_for
            .get(&start)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();

        while let Some(current) = stack.pop() {
            if current == start {
                return true;
            }
            if visited.insert(current) {
                if let Some(next) = self.waits_for.get(&current) {
                    stack.extend(next.iter().copied());
                }
            }
        }
        false
    }

    fn stop_waiting(&mut self, txn: TransactionId) {
        self.waits_for.remove(&txn);
    }
}

/// Grants shared/exclusive page locks to transactions.
#[derive(Debug)]
pub struct LockManager {
    table: Mutex<LockTable>,
    released: Condvar,
    timeout: Option<Duration>,
}

impl LockManager {
    /// `timeout` bounds how long a single request may wait; `None` waits
    /// until granted or a deadlock is detected.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            released: Condvar::new(),
            timeout,
        }
    }

    /// Block until `txn` holds `page_id` in `mode`, or abort it.
    pub fn acquire(&self, txn: TransactionId, page_id: PageId, mode: LockMode) -> DbResult<()> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut table = self.table.lock();

        loop {
            let blockers = match table.try_grant(txn, page_id, mode) {
                Ok(()) => {
                    table.stop_waiting(txn);
                    trace!("{} granted {:?} on page {}", txn, mode, page_id);
                    return Ok(());
                }
                Err(blockers) => blockers,
            };

            table.waits_for.insert(txn, blockers);
            if table.in_cycle(txn) {
                table.stop_waiting(txn);
                debug!("{} aborted: deadlock on page {}", txn, page_id);
                return Err(DbError::TransactionAborted {
                    txn,
                    reason: format!("deadlock detected waiting for page {}", page_id),
                });
            }

            trace!("{} waiting for {:?} on page {}", txn, mode, page_id);
            match deadline {
                Some(deadline) => {
                    if self.released.wait_until(&mut table, deadline).timed_out() {
                        // One last try: the release may have raced the timeout
                        if table.try_grant(txn, page_id, mode).is_ok() {
                            table.stop_waiting(txn);
                            return Ok(());
                        }
                        table.stop_waiting(txn);
                        debug!("{} aborted: lock wait on page {} timed out", txn, page_id);
                        return Err(DbError::TransactionAborted {
                            txn,
                            reason: format!("timed out waiting for page {}", page_id),
                        });
                    }
                }
                None => self.released.wait(&mut table),
            }
        }
    }

    /// Release every lock held by `txn` and wake waiters.
    pub fn release_all(&self, txn: TransactionId) {
        let mut table = self.table.lock();
        let pages = table.held.remove(&txn).unwrap_or_default();

        for page_id in &pages {
            let now_free = match table.entries.get_mut(page_id) {
                Some(entry) => {
                    entry.holders.remove(&txn);
                    entry.holders.is_empty()
                }
                None => false,
            };
            if now_free {
                table.entries.remove(page_id);
            }
        }

        table.waits_for.remove(&txn);
        for waiting_on in table.waits_for.values_mut() {
            waiting_on.remove(&txn);
        }
        drop(table);

        debug!("{} released {} page locks", txn, pages.len());
        self.released.notify_all();
    }

    /// Whether `txn` holds any lock on `page_id`.
    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.table
            .lock()
            .held
            .get(&txn)
            .is_some_and(|pages| pages.contains(&page_id))
    }

    /// Mode of the lock currently granted on `page_id`, if any.
    pub fn lock_mode(&self, page_id: PageId) -> Option<LockMode> {
        self.table.lock().entries.get(&page_id).map(|e| e.mode)
    }

    pub fn locked_pages(&self, txn: TransactionId) -> Vec<PageId> {
        self.table
            .lock()
            .held
            .get(&txn)
            .map(|pages| pages.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(None)
    }
}
