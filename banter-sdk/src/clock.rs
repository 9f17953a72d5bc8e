//! Delay abstraction so retry timing is injectable in tests.

use std::time::Duration;

use async_trait::async_trait;

/// Source of delays for the fixed-interval retry loops.
#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Tokio-backed wall clock used outside tests.
#[derive(Debug, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
