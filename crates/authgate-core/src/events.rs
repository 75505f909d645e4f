//! Publish/subscribe channel for session state changes.
//!
//! Every subscriber gets its own unbounded queue, so a slow listener never
//! loses a `LoginConfirmed` or `LoginCancelled` that the ledger depends on.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use crate::api::RequestSpec;
use crate::auth::SessionUser;

/// Reason tag carried by `LoginCancelled` when the user dismisses the prompt.
pub const CANCELLED_BY_USER: &str = "cancelledByUser";

#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// A request came back 401 and was suspended
    LoginRequired { request: RequestSpec },
    /// Session established or cleared (logout confirms the anonymous user)
    LoginConfirmed(SessionUser),
    /// The user gave up on the login prompt
    LoginCancelled { reason: String },
}

impl AuthEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::LoginRequired { .. } => "login-required",
            AuthEvent::LoginConfirmed(_) => "login-confirmed",
            AuthEvent::LoginCancelled { .. } => "login-cancelled",
        }
    }
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<AuthEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<AuthEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Deliver to every live subscriber; dropped receivers are pruned.
    pub fn publish(&self, event: AuthEvent) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        debug!(event = event.name(), subscribers = subscribers.len(), "Event published");
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(AuthEvent::LoginCancelled {
            reason: CANCELLED_BY_USER.to_string(),
        });

        for rx in [&mut a, &mut b] {
            match rx.try_recv() {
                Ok(AuthEvent::LoginCancelled { reason }) => assert_eq!(reason, CANCELLED_BY_USER),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let _kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(AuthEvent::LoginConfirmed(SessionUser::default()));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_events_queue_without_a_reader() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        for _ in 0..1000 {
            bus.publish(AuthEvent::LoginRequired {
                request: RequestSpec::get("/api/items"),
            });
        }
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, 1000);
    }
}
