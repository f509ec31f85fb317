//! Progress tracking

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

#[derive(Debug, Default)]
pub struct ProgressTracker {
    total: AtomicUsize,
    scanned: AtomicUsize,
    open: AtomicUsize,
    fingerprinted: AtomicUsize,
    unreachable: AtomicUsize,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn record_scanned(&self, open: bool) {
        self.scanned.fetch_add(1, Ordering::Relaxed);
        if open {
            self.open.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// `reached` is false when the port could not be reconnected to.
    pub fn record_fingerprinted(&self, reached: bool) {
        self.fingerprinted.fetch_add(1, Ordering::Relaxed);
        if !reached {
            self.unreachable.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn total(&self) -> usize { self.total.load(Ordering::Relaxed) }
    pub fn scanned(&self) -> usize { self.scanned.load(Ordering::Relaxed) }
    pub fn open(&self) -> usize { self.open.load(Ordering::Relaxed) }
    pub fn fingerprinted(&self) -> usize { self.fingerprinted.load(Ordering::Relaxed) }
    pub fn unreachable(&self) -> usize { self.unreachable.load(Ordering::Relaxed) }

    pub fn print_summary(&self) {
        info!("Scan Summary:");
        info!("  Ports considered: {}", self.total());
        info!("  Scanned: {}", self.scanned());
        info!("  Open: {}", self.open());
        info!("  Fingerprinted: {}", self.fingerprinted());
        info!("  Unreachable on second connect: {}", self.unreachable());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate() {
        let progress = ProgressTracker::new();
        progress.set_total(3);
        progress.record_scanned(true);
        progress.record_scanned(false);
        progress.record_scanned(true);
        progress.record_fingerprinted(true);
        progress.record_fingerprinted(false);

        assert_eq!(progress.total(), 3);
        assert_eq!(progress.scanned(), 3);
        assert_eq!(progress.open(), 2);
        assert_eq!(progress.fingerprinted(), 2);
        assert_eq!(progress.unreachable(), 1);
    }
}
