use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Collection progress in percent, shared between the collecting task and
/// whoever polls it. Never decreases; 100 does not imply success.
#[derive(Debug, Clone, Default)]
pub struct Progress(Arc<AtomicU8>);

impl Progress {
    pub const MAX: u8 = 100;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: u8) {
        self.0.fetch_max(value.min(Self::MAX), Ordering::Relaxed);
    }

    pub fn get(&self) -> u8 {
        self.0.load(Ordering::Relaxed)
    }

    /// Sets progress to `done / total` of the way between `from` and `to`.
    pub fn step(&self, from: u8, to: u8, done: usize, total: usize) {
        if total == 0 || to <= from {
            self.set(to);
            return;
        }
        let span = (to - from) as usize;
        let value = from as usize + span * done.min(total) / total;
        self.set(value as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_zero() {
        assert_eq!(Progress::new().get(), 0);
    }

    #[test]
    fn test_never_decreases() {
        let progress = Progress::new();
        progress.set(40);
        progress.set(10);
        assert_eq!(progress.get(), 40);
    }

    #[test]
    fn test_clamped_to_max() {
        let progress = Progress::new();
        progress.set(250);
        assert_eq!(progress.get(), 100);
    }

    #[test]
    fn test_clones_share_value() {
        let progress = Progress::new();
        let reader = progress.clone();
        progress.set(55);
        assert_eq!(reader.get(), 55);
    }

    #[test]
    fn test_step_interpolates() {
        let progress = Progress::new();
        progress.step(20, 80, 1, 2);
        assert_eq!(progress.get(), 50);
        progress.step(20, 80, 5, 2);
        assert_eq!(progress.get(), 80);
        progress.step(80, 90, 0, 0);
        assert_eq!(progress.get(), 90);
    }

    #[tokio::test]
    async fn test_concurrent_reads_during_updates() {
        let progress = Progress::new();
        let writer = progress.clone();
        let handle = tokio::spawn(async move {
            for v in 0..=100u8 {
                writer.set(v);
                tokio::task::yield_now().await;
            }
        });

        let mut last = 0;
        while !handle.is_finished() {
            let now = progress.get();
            assert!(now >= last);
            last = now;
            tokio::task::yield_now().await;
        }
        handle.await.unwrap();
        assert_eq!(progress.get(), 100);
    }
}
