//! Fixed pause between retry attempts

use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

/// How a pause ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paused {
    Elapsed,
    Interrupted,
}

/// Fixed-delay pause, cut short when shutdown is signalled.
///
/// Only the task handling the current message waits; the runtime keeps
/// serving other messages.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Backoff {
    pub fn new(delay: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self { delay, shutdown }
    }

    /// Backoff that can never be interrupted
    pub fn fixed(delay: Duration) -> Self {
        let (_tx, rx) = watch::channel(false);
        Self::new(delay, rx)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Sleep for the configured delay
    pub async fn pause(&self) -> Paused {
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => Paused::Elapsed,
            _ = wait_for_shutdown(&mut shutdown) => {
                info!("Interrupted retries");
                Paused::Interrupted
            }
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            // sender gone, shutdown can no longer be signalled
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_pause_waits_for_delay() {
        let backoff = Backoff::fixed(Duration::from_millis(20));
        let started = Instant::now();
        assert_eq!(backoff.pause().await, Paused::Elapsed);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_pause() {
        let (tx, rx) = watch::channel(false);
        let backoff = Backoff::new(Duration::from_secs(3600), rx);

        let pause = tokio::spawn(async move { backoff.pause().await });
        tx.send(true).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), pause)
            .await
            .expect("pause should end on shutdown")
            .unwrap();
        assert_eq!(outcome, Paused::Interrupted);
    }

    #[tokio::test]
    async fn test_pause_after_shutdown_returns_immediately() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let backoff = Backoff::new(Duration::from_secs(3600), rx);

        let outcome = tokio::time::timeout(Duration::from_secs(5), backoff.pause())
            .await
            .expect("pause should not wait after shutdown");
        assert_eq!(outcome, Paused::Interrupted);
    }
}
