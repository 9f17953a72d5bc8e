//! Ordered listener dispatch decoupling the transport from its consumers.
//!
//! Not a message queue: invocation is synchronous, on the producer's task,
//! with no buffering. Registration is append-only and is expected to happen
//! during startup wiring, before the receive loop starts consuming.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::RwLock;

use crate::error::TransportError;
use crate::message::Envelope;

/// Invoked for every decoded envelope; self-filters by message type.
/// Listeners report their own failures and must not abort dispatch.
pub type ResponseListener = Box<dyn Fn(Envelope) -> BoxFuture<'static, ()> + Send + Sync>;

/// Invoked with the triggering error when the connection is detected lost.
pub type DisconnectListener =
    Box<dyn Fn(Arc<TransportError>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Event bus owned by the transport and injected at construction.
///
/// Guarantees that invocation order equals registration order. There is no
/// de-registration.
#[derive(Default)]
pub struct EventBus {
    on_response: RwLock<Vec<ResponseListener>>,
    on_disconnect: RwLock<Vec<DisconnectListener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` to run for every received envelope.
    pub async fn add_response_listener(&self, listener: ResponseListener) {
        self.on_response.write().await.push(listener);
    }

    /// Register `listener` to run when the connection to the server is lost.
    pub async fn add_disconnect_listener(&self, listener: DisconnectListener) {
        self.on_disconnect.write().await.push(listener);
    }

    /// Fan `envelope` out to every response listener, in registration order.
    pub async fn dispatch_response(&self, envelope: &Envelope) {
        let listeners = self.on_response.read().await;
        for listener in listeners.iter() {
            listener(envelope.clone()).await;
        }
    }

    /// Fan the disconnect out to every disconnect listener, in registration
    /// order.
    pub async fn dispatch_disconnect(&self, error: Arc<TransportError>) {
        let listeners = self.on_disconnect.read().await;
        for listener in listeners.iter() {
            listener(Arc::clone(&error)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::message::{Envelope, LoginRequest};

    #[tokio::test]
    async fn response_dispatch_follows_registration_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for id in 0..5 {
            let seen = Arc::clone(&seen);
            bus.add_response_listener(Box::new(move |_| {
                let seen = Arc::clone(&seen);
                Box::pin(async move {
                    seen.lock().unwrap().push(id);
                })
            }))
            .await;
        }

        let envelope = Envelope::encode(&LoginRequest::new("alice")).unwrap();
        bus.dispatch_response(&envelope).await;
        bus.dispatch_response(&envelope).await;

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4, 0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn every_listener_receives_the_full_envelope() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let seen = Arc::clone(&seen);
            bus.add_response_listener(Box::new(move |envelope| {
                let seen = Arc::clone(&seen);
                Box::pin(async move {
                    seen.lock().unwrap().push(envelope);
                })
            }))
            .await;
        }

        let envelope = Envelope::from_json(r#"{"type":4,"status":1}"#).unwrap();
        bus.dispatch_response(&envelope).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|e| *e == envelope));
    }

    #[tokio::test]
    async fn disconnect_listeners_all_observe_the_error() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        for _ in 0..3 {
            let count = Arc::clone(&count);
            bus.add_disconnect_listener(Box::new(move |error| {
                let count = Arc::clone(&count);
                Box::pin(async move {
                    assert!(matches!(*error, TransportError::Closed));
                    *count.lock().unwrap() += 1;
                })
            }))
            .await;
        }

        bus.dispatch_disconnect(Arc::new(TransportError::Closed)).await;
        assert_eq!(*count.lock().unwrap(), 3);
    }
}
