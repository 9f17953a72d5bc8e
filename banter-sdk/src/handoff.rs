//! Single-slot hand-off delivering one value to one waiter.

use std::sync::Mutex;

use tokio::sync::oneshot;

/// A single-slot promise: at most one waiter is armed at a time, and a value
/// offered while a waiter is armed is delivered to it exactly once.
///
/// Offering with no waiter armed drops the value and reports it — it never
/// blocks, so a producer on the receive-loop task cannot deadlock. Re-arming
/// replaces (and thereby cancels) the previous waiter.
pub struct Handoff<T> {
    slot: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> Handoff<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Arm the hand-off and return the receiving end for the single waiter.
    ///
    /// The value is buffered by the channel, so the waiter may start
    /// awaiting after the value was offered.
    pub fn arm(&self) -> oneshot::Receiver<T> {
        let (tx, rx) = oneshot::channel();
        *self.slot.lock().unwrap() = Some(tx);
        rx
    }

    /// Offer a value to the armed waiter, consuming the slot.
    ///
    /// Returns `true` when a waiter existed and the value was handed over.
    pub fn offer(&self, value: T) -> bool {
        let sender = self.slot.lock().unwrap().take();
        match sender {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }
}

impl<T> Default for Handoff<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_exactly_one_value_to_one_waiter() {
        let handoff = Handoff::new();
        let rx = handoff.arm();

        assert!(handoff.offer("token-1".to_string()));
        assert_eq!(rx.await.unwrap(), "token-1");

        // The slot was consumed; a second offer has no waiter.
        assert!(!handoff.offer("token-2".to_string()));
    }

    #[test]
    fn offer_without_waiter_does_not_block() {
        let handoff = Handoff::new();
        assert!(!handoff.offer(1));
        assert!(!handoff.is_armed());
    }

    #[tokio::test]
    async fn rearm_cancels_the_previous_waiter() {
        let handoff = Handoff::new();
        let stale = handoff.arm();
        let fresh = handoff.arm();

        assert!(handoff.offer(7));
        assert_eq!(fresh.await.unwrap(), 7);
        assert!(stale.await.is_err());
    }

    #[tokio::test]
    async fn value_is_buffered_until_the_waiter_awaits() {
        let handoff = Handoff::new();
        let rx = handoff.arm();
        assert!(handoff.offer(99));
        // Await strictly after the offer.
        assert_eq!(rx.await.unwrap(), 99);
    }
}
