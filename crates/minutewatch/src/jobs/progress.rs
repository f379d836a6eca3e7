//! Live counters for a running job.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct JobProgress {
    sources_total: AtomicU64,
    sources_processed: AtomicU64,
    documents_discovered: AtomicU64,
    documents_scanned: AtomicU64,
    documents_failed: AtomicU64,
    pages_scanned: AtomicU64,
    matches_found: AtomicU64,
    write_failures: AtomicU64,
}

/// Point-in-time copy of [`JobProgress`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub sources_total: u64,
    pub sources_processed: u64,
    pub documents_discovered: u64,
    pub documents_scanned: u64,
    pub documents_failed: u64,
    pub pages_scanned: u64,
    pub matches_found: u64,
    pub write_failures: u64,
}

impl ProgressSnapshot {
    /// Documents that went through the scanner, successfully or not.
    pub fn documents_processed(&self) -> u64 {
        self.documents_scanned + self.documents_failed
    }
}

impl JobProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_sources_total(&self, n: u64) {
        self.sources_total.store(n, Ordering::Relaxed);
    }

    pub fn source_processed(&self) {
        self.sources_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn documents_discovered(&self, n: u64) {
        self.documents_discovered.fetch_add(n, Ordering::Relaxed);
    }

    pub fn document_scanned(&self, pages: u64) {
        self.documents_scanned.fetch_add(1, Ordering::Relaxed);
        self.pages_scanned.fetch_add(pages, Ordering::Relaxed);
    }

    pub fn document_failed(&self) {
        self.documents_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn matches_found(&self, n: u64) {
        self.matches_found.fetch_add(n, Ordering::Relaxed);
    }

    pub fn write_failed(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            sources_total: self.sources_total.load(Ordering::Relaxed),
            sources_processed: self.sources_processed.load(Ordering::Relaxed),
            documents_discovered: self.documents_discovered.load(Ordering::Relaxed),
            documents_scanned: self.documents_scanned.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            pages_scanned: self.pages_scanned.load(Ordering::Relaxed),
            matches_found: self.matches_found.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
        }
    }
}
