//! Multi-account rotation.
//!
//! One process-wide index over the configured account list. Throttling
//! advances it (mod N); success leaves it alone. Rotation is an
//! optimization, so the index only needs atomic read-modify-write, not
//! fairness.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin pool over account ids.
#[derive(Debug, Default)]
pub struct AccountPool {
    accounts: Vec<String>,
    index: AtomicUsize,
}

impl AccountPool {
    /// Create a pool over the given accounts.
    #[must_use]
    pub fn new(accounts: Vec<String>) -> Self {
        Self {
            accounts,
            index: AtomicUsize::new(0),
        }
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns `true` when no accounts are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// The account currently selected, if any.
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        if self.accounts.is_empty() {
            return None;
        }
        let i = self.index.load(Ordering::Relaxed) % self.accounts.len();
        Some(&self.accounts[i])
    }

    /// Advance to the next account (mod N). Returns the new index.
    pub fn advance(&self) -> usize {
        if self.accounts.is_empty() {
            return 0;
        }
        (self.index.fetch_add(1, Ordering::Relaxed) + 1) % self.accounts.len()
    }

    /// The current index (mod N), for logging.
    #[must_use]
    pub fn current_index(&self) -> usize {
        if self.accounts.is_empty() {
            return 0;
        }
        self.index.load(Ordering::Relaxed) % self.accounts.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
