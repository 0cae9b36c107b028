//! Cancel-and-reschedule timer

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::trace;

/// Collapses bursts of triggers into one action fired `delay` after the last
///
/// Each trigger aborts the pending timer and spawns a new one tagged with a
/// fresh generation. A timer that already fired before being aborted may
/// still deliver its generation, so receivers should confirm it with
/// [`is_current`](Self::is_current).
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: 0,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `fire(generation)` after the delay, replacing any pending timer
    pub fn trigger<F>(&mut self, fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        if let Some(handle) = self.pending.take() {
            handle.abort();
            trace!("Debounce timer {} superseded", self.generation);
        }
        self.generation += 1;
        let generation = self.generation;
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            sleep(delay).await;
            fire(generation);
        }));
        generation
    }

    /// Whether `generation` belongs to the latest, uncancelled trigger
    pub fn is_current(&self, generation: u64) -> bool {
        self.pending.is_some() && generation == self.generation
    }

    /// Mark the latest timer as consumed
    pub fn complete(&mut self, generation: u64) -> bool {
        if self.is_current(generation) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Abort any pending timer; returns whether one was pending
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once_after_last_trigger() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let start = Instant::now();

        for _ in 0..5 {
            let tx = tx.clone();
            debouncer.trigger(move |generation| {
                let _ = tx.send((generation, Instant::now()));
            });
            sleep(Duration::from_millis(30)).await;
        }

        let (generation, fired_at) = rx.recv().await.unwrap();
        assert_eq!(generation, 5);
        assert!(debouncer.complete(generation));
        // Last trigger at 120ms, plus the 100ms delay
        assert_eq!(fired_at - start, Duration::from_millis(220));

        drop(tx);
        drop(debouncer);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        debouncer.trigger(move |generation| {
            let _ = tx.send(generation);
        });
        assert!(debouncer.cancel());
        assert!(!debouncer.is_pending());

        sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_not_current() {
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        let first = debouncer.trigger(|_| {});
        let second = debouncer.trigger(|_| {});
        assert!(!debouncer.is_current(first));
        assert!(debouncer.is_current(second));
        assert!(!debouncer.complete(first));
    }
}
