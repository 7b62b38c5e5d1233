//! Per-DOI leases
//!
//! Two deliveries for the same DOI must not interleave their
//! get → authority call → store write sequences, otherwise the last writer
//! wins with a stale view. Different DOIs proceed in parallel.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::doi::Doi;

type LockTable = DashMap<Doi, Arc<Mutex<()>>>;

/// Table of per-DOI locks, entries exist only while someone holds or waits
#[derive(Debug, Clone, Default)]
pub struct DoiLocks {
    inner: Arc<LockTable>,
}

/// Exclusive hold on one DOI, released on drop
pub struct DoiLease {
    doi: Doi,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<LockTable>,
}

impl DoiLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no one else holds `doi`, then take it
    pub async fn acquire(&self, doi: &Doi) -> DoiLease {
        let mutex = self.inner.entry(doi.clone()).or_default().value().clone();
        let guard = mutex.lock_owned().await;
        DoiLease {
            doi: doi.clone(),
            guard: Some(guard),
            table: Arc::clone(&self.inner),
        }
    }

    /// Number of DOIs currently held or waited on
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl DoiLease {
    pub fn doi(&self) -> &Doi {
        &self.doi
    }
}

impl Drop for DoiLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        // the table's own Arc is the only one left when nobody is waiting
        self.table
            .remove_if(&self.doi, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn doi(n: u32) -> Doi {
        Doi::parse(&format!("10.5072/lease.{}", n)).unwrap()
    }

    #[tokio::test]
    async fn test_same_doi_is_exclusive() {
        let locks = DoiLocks::new();
        let held = locks.acquire(&doi(1)).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _lease = locks.acquire(&doi(1)).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(5), contender)
            .await
            .expect("contender should get the lease")
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_dois_do_not_block() {
        let locks = DoiLocks::new();
        let _first = locks.acquire(&doi(1)).await;
        let second = tokio::time::timeout(Duration::from_secs(1), locks.acquire(&doi(2)))
            .await
            .expect("other DOI must not wait");
        assert_eq!(second.doi(), &doi(2));
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = DoiLocks::new();
        {
            let _lease = locks.acquire(&doi(3)).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }
}
