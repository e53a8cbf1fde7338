//! Global stop signal for running pipeline components
//!
//! A [`StopHandle`] is created together with any number of [`StopToken`]s
//! through [`channel`]. Stopping the handle (or dropping it) wakes every task
//! waiting on [`StopToken::stopped`].

use tokio::sync::watch;

/// Sending side of the stop signal
#[derive(Debug)]
pub struct StopHandle(watch::Sender<bool>);

/// Receiving side of the stop signal
#[derive(Clone, Debug)]
pub struct StopToken(watch::Receiver<bool>);

/// Create a connected [`StopHandle`] and [`StopToken`]
pub fn channel() -> (StopHandle, StopToken) {
    let (tx, rx) = watch::channel(false);
    (StopHandle(tx), StopToken(rx))
}

impl StopHandle {
    /// Signal all tokens to stop
    pub fn stop(&self) {
        self.0.send_replace(true);
    }
    /// Obtain another token
    pub fn token(&self) -> StopToken {
        StopToken(self.0.subscribe())
    }
    /// Whether [`StopHandle::stop`] has been called
    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }
}

impl StopToken {
    /// Whether stopping has been requested (or the handle was dropped)
    pub fn is_stopped(&self) -> bool {
        *self.0.borrow() || self.0.has_changed().is_err()
    }
    /// Wait until stopping is requested
    pub async fn stopped(&self) {
        let mut rx = self.0.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    #[tokio::test]
    async fn test_stop_wakes_waiters() {
        let (handle, token) = channel();
        let other = handle.token();
        assert!(!token.is_stopped());
        let waiter = tokio::spawn(async move { other.stopped().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.stop();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(token.is_stopped());
    }
    #[tokio::test]
    async fn test_drop_counts_as_stop() {
        let (handle, token) = channel();
        drop(handle);
        assert!(token.is_stopped());
        token.stopped().await;
    }
}
