//! Credential pool with a shared rotation cursor

use crate::answer::ProviderError;
use crate::models::Credential;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Ordered credentials with cyclic failover.
///
/// The cursor is shared by every account. `advance` only moves it when it still
/// points at the key that failed, so two concurrent failures on the same key
/// move it once and never skip a key that has not been tried.
#[derive(Debug)]
pub struct CredentialPool {
    keys: Vec<Credential>,
    cursor: AtomicUsize,
}

impl CredentialPool {
    pub fn new(keys: Vec<Credential>) -> Result<Self, ProviderError> {
        if keys.is_empty() {
            return Err(ProviderError::EmptyPool);
        }
        Ok(Self {
            keys,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, index: usize) -> &Credential {
        &self.keys[index % self.keys.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Credential> {
        self.keys.iter()
    }

    /// Index and key the cursor points at
    pub fn current(&self) -> (usize, &Credential) {
        let index = self.cursor.load(Ordering::Acquire);
        (index, &self.keys[index])
    }

    /// Move past `failed` if the cursor still points at it. Returns the cursor afterwards.
    pub fn advance(&self, failed: usize) -> usize {
        let next = (failed + 1) % self.keys.len();
        match self
            .cursor
            .compare_exchange(failed, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                tracing::warn!(
                    from = failed + 1,
                    to = next + 1,
                    key = %self.keys[next].masked(),
                    "Switched reasoning API key"
                );
                next
            }
            Err(actual) => actual,
        }
    }

    /// Point the cursor at `index` unconditionally
    pub fn adopt(&self, index: usize) {
        self.cursor
            .store(index % self.keys.len(), Ordering::Release);
    }
}
