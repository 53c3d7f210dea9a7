use std::sync::atomic::{AtomicBool, Ordering};

/// One-way shutdown flag observed by every actor.
///
/// Transitions false -> true exactly once; readers never take a lock.
#[derive(Debug, Default)]
pub struct Shutdown {
    triggered: AtomicBool,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only for the call that performed the transition.
    pub fn trigger(&self) -> bool {
        !self.triggered.swap(true, Ordering::AcqRel)
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    pub fn is_active(&self) -> bool {
        !self.is_triggered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_single_transition() {
        let shutdown = Shutdown::new();
        assert!(shutdown.is_active());
        assert!(shutdown.trigger());
        assert!(!shutdown.trigger());
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn test_only_one_thread_wins() {
        let shutdown = Arc::new(Shutdown::new());
        let winners: usize = (0..8)
            .map(|_| {
                let shutdown = shutdown.clone();
                thread::spawn(move || shutdown.trigger())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().map(usize::from).unwrap_or(0))
            .sum();
        assert_eq!(1, winners);
    }
}
