use log::info;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Shared completion counter. Workers only ever add to it; a line is
/// logged each time another tenth of the total is crossed.
#[derive(Debug)]
pub struct Progress {
    label: &'static str,
    total: usize,
    step: usize,
    done: AtomicUsize,
}

impl Progress {
    pub fn new(label: &'static str, total: usize) -> Self {
        Self {
            label,
            total,
            step: (total / 10).max(1),
            done: AtomicUsize::new(0),
        }
    }

    pub fn advance(&self, n: usize) {
        if n == 0 {
            return;
        }
        let before = self.done.fetch_add(n, Ordering::SeqCst);
        let after = before + n;
        if after / self.step != before / self.step || after >= self.total {
            info!("{}: {}/{}", self.label, after.min(self.total), self.total);
        }
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

/// Raised by the Ctrl-C handler; body workers check it between batches.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
