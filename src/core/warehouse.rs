//! FIFO-fair blocking warehouse.
//!
//! Every stocked item has its own lock, condition variable, loan ledger and
//! wait queue. A borrower that cannot be served immediately takes a ticket
//! in the item's queue and is released only when its ticket reaches the
//! head of the queue *and* enough units are on the shelf. Waking uses
//! `notify_all`, so the head check is what keeps later arrivals from
//! overtaking earlier ones.
//!
//! Items of one request are acquired in name order. Since every mission
//! requests its items sorted by name, two borrowers can never wait on each
//! other in a cycle.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, warn};

use crate::core::{Item, WarehouseError};

/// Mutable state of one stocked item.
#[derive(Debug)]
struct StockState {
    initial: u32,
    available: u32,
    loans: BTreeMap<String, u32>,
    waiters: VecDeque<u64>,
    next_ticket: u64,
    closed: bool,
}

impl StockState {
    fn lend(&mut self, borrower: &str, amount: u32) {
        self.available -= amount;
        *self.loans.entry(borrower.to_string()).or_insert(0) += amount;
    }
}

/// A single item kind on the warehouse shelf.
#[derive(Debug)]
pub struct StockItem {
    name: String,
    state: Mutex<StockState>,
    changed: Condvar,
}

impl StockItem {
    fn new(name: String, amount: u32, closed: bool) -> Self {
        Self {
            name,
            state: Mutex::new(StockState {
                initial: amount,
                available: amount,
                loans: BTreeMap::new(),
                waiters: VecDeque::new(),
                next_ticket: 0,
                closed,
            }),
            changed: Condvar::new(),
        }
    }

    /// Item name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until `amount` units can be lent to `borrower` in FIFO order.
    fn acquire(&self, borrower: &str, amount: u32) -> Result<(), WarehouseError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(WarehouseError::Closed);
        }
        if state.waiters.is_empty() && amount <= state.available {
            state.lend(borrower, amount);
            return Ok(());
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.waiters.push_back(ticket);
        debug!(
            item = %self.name,
            borrower = borrower,
            amount = amount,
            queued = state.waiters.len(),
            "waiting for stock"
        );

        loop {
            if state.closed {
                state.waiters.retain(|t| *t != ticket);
                self.changed.notify_all();
                return Err(WarehouseError::Closed);
            }
            if state.waiters.front() == Some(&ticket) && amount <= state.available {
                break;
            }
            self.changed.wait(&mut state);
        }

        state.waiters.pop_front();
        state.lend(borrower, amount);
        // The next head may already be satisfiable.
        self.changed.notify_all();
        Ok(())
    }

    fn release(&self, borrower: &str, amount: u32) -> Result<(), WarehouseError> {
        let mut state = self.state.lock();
        let held = state.loans.get(borrower).copied().unwrap_or(0);
        if held < amount {
            return Err(WarehouseError::NotOnLoan {
                item: self.name.clone(),
                borrower: borrower.to_string(),
                returned: amount,
                held,
            });
        }
        if held == amount {
            state.loans.remove(borrower);
        } else {
            state.loans.insert(borrower.to_string(), held - amount);
        }
        state.available += amount;
        self.changed.notify_all();
        Ok(())
    }

    fn restock(&self, amount: u32) -> Result<(), WarehouseError> {
        let mut state = self.state.lock();
        let initial = state
            .initial
            .checked_add(amount)
            .ok_or_else(|| WarehouseError::Overflow(self.name.clone()))?;
        // available <= initial, so this cannot overflow once initial fits.
        state.initial = initial;
        state.available += amount;
        self.changed.notify_all();
        Ok(())
    }

    fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.changed.notify_all();
    }

    /// Capture the current amounts and loan ledger.
    #[must_use]
    pub fn snapshot(&self) -> StockSnapshot {
        let state = self.state.lock();
        StockSnapshot {
            name: self.name.clone(),
            initial: state.initial,
            available: state.available,
            waiting: state.waiters.len(),
            loans: state
                .loans
                .iter()
                .map(|(borrower, amount)| Loan {
                    borrower: borrower.clone(),
                    amount: *amount,
                })
                .collect(),
        }
    }
}

/// Units of one item held by one borrower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Loan {
    /// Borrower (sergeant) name.
    pub borrower: String,
    /// Units held.
    pub amount: u32,
}

/// Point-in-time view of a stocked item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockSnapshot {
    /// Item name.
    pub name: String,
    /// Total units owned by the warehouse, including loans.
    pub initial: u32,
    /// Units currently on the shelf.
    pub available: u32,
    /// Borrowers queued for this item.
    pub waiting: usize,
    /// Outstanding loans by borrower name.
    pub loans: Vec<Loan>,
}

impl StockSnapshot {
    /// Sum of all outstanding loans.
    #[must_use]
    pub fn on_loan(&self) -> u32 {
        self.loans.iter().map(|loan| loan.amount).sum()
    }
}

/// Shared inventory of reusable items.
#[derive(Debug, Default)]
pub struct Warehouse {
    items: RwLock<BTreeMap<String, Arc<StockItem>>>,
    closed: AtomicBool,
}

impl Warehouse {
    /// Create an empty warehouse.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` units of `name`, creating the entry if needed.
    ///
    /// # Errors
    ///
    /// `WarehouseError::Overflow` if the total would exceed `u32::MAX`; the
    /// stock is left unchanged.
    pub fn add_stock(&self, name: &str, amount: u32) -> Result<(), WarehouseError> {
        let mut items = self.items.write();
        if let Some(item) = items.get(name) {
            if let Err(e) = item.restock(amount) {
                warn!(item = name, amount = amount, "restock refused, amount overflows");
                return Err(e);
            }
            debug!(item = name, amount = amount, "restocked item");
        } else {
            let closed = self.closed.load(Ordering::Acquire);
            items.insert(
                name.to_string(),
                Arc::new(StockItem::new(name.to_string(), amount, closed)),
            );
            debug!(item = name, amount = amount, "stocked new item");
        }
        Ok(())
    }

    fn resolve(&self, items: &[Item]) -> Result<Vec<(Arc<StockItem>, u32)>, WarehouseError> {
        let shelf = self.items.read();
        let mut resolved = items
            .iter()
            .map(|item| {
                shelf
                    .get(&item.name)
                    .map(|stock| (Arc::clone(stock), item.amount))
                    .ok_or_else(|| WarehouseError::UnknownItem(item.name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        resolved.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        Ok(resolved)
    }

    /// Borrow every listed item for `borrower`, blocking until each is granted.
    ///
    /// # Errors
    ///
    /// - `WarehouseError::UnknownItem` if any name is not stocked; nothing is
    ///   borrowed in that case.
    /// - `WarehouseError::Closed` if the warehouse closes while waiting; units
    ///   already taken by this call are given back.
    pub fn borrow(&self, borrower: &str, items: &[Item]) -> Result<(), WarehouseError> {
        let resolved = self.resolve(items)?;
        for (idx, (stock, amount)) in resolved.iter().enumerate() {
            if let Err(e) = stock.acquire(borrower, *amount) {
                for (taken, taken_amount) in &resolved[..idx] {
                    if let Err(release_err) = taken.release(borrower, *taken_amount) {
                        warn!(error = %release_err, "failed to roll back partial borrow");
                    }
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Give back every listed item from `borrower` and wake waiting borrowers.
    ///
    /// # Errors
    ///
    /// `WarehouseError::UnknownItem` if any name is not stocked (nothing is
    /// returned), or the first `NotOnLoan` hit; other items are still returned.
    pub fn return_items(&self, borrower: &str, items: &[Item]) -> Result<(), WarehouseError> {
        let resolved = self.resolve(items)?;
        let mut first_err = None;
        for (stock, amount) in resolved {
            if let Err(e) = stock.release(borrower, amount) {
                warn!(error = %e, "over-return to warehouse ignored");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Wake every blocked borrower with `WarehouseError::Closed` and refuse new borrows.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        for item in self.items.read().values() {
            item.close();
        }
    }

    /// Whether [`Warehouse::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Snapshot of a single item.
    #[must_use]
    pub fn stock(&self, name: &str) -> Option<StockSnapshot> {
        self.items.read().get(name).map(|item| item.snapshot())
    }

    /// Snapshot of every item, ordered by name.
    #[must_use]
    pub fn snapshot(&self) -> Vec<StockSnapshot> {
        self.items.read().values().map(|item| item.snapshot()).collect()
    }
}
