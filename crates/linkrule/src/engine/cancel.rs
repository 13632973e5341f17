use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag for stopping a long scan or reconciliation pass.
///
/// Clones share the same flag; cancelling any clone cancels them all.
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let cancel = Cancellation::new();
        let other = cancel.clone();
        assert!(!other.is_cancelled());

        cancel.cancel();
        assert!(other.is_cancelled());
    }
}
