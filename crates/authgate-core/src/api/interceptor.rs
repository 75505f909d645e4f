//! Request path that survives an expired session.
//!
//! A 401 does not reach the caller: the request is parked in the ledger, the
//! login prompt is opened, and the caller keeps waiting. Confirming the login
//! releases every parked request and `LoginConfirmed` makes the listener
//! re-issue them, handing each caller its new outcome. Cancelling fails them
//! all with the cancellation reason before `LoginCancelled` is published.

use std::sync::{Arc, Weak};

use futures::future::join_all;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::ledger::{Outcome, PendingLedger, SuspendedRequest};
use super::{AuthError, HttpResponse, RequestSpec, Transport};
use crate::auth::{AuthService, DialogGuard};
use crate::events::{AuthEvent, EventBus};

pub struct AuthInterceptor {
    transport: Arc<dyn Transport>,
    ledger: Arc<PendingLedger>,
    guard: Arc<DialogGuard>,
    events: Arc<EventBus>,
}

impl AuthInterceptor {
    /// Park requests in `auth`'s ledger, which `auth` ends on every
    /// confirmed or cancelled login.
    pub fn new(transport: Arc<dyn Transport>, auth: &Arc<AuthService>, guard: Arc<DialogGuard>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            ledger: Arc::clone(auth.pending_requests()),
            guard,
            events: Arc::clone(auth.events()),
        })
    }

    /// Number of requests waiting on the current login cycle
    pub fn pending(&self) -> usize {
        self.ledger.len()
    }

    pub fn guard(&self) -> &Arc<DialogGuard> {
        &self.guard
    }

    /// Issue a request. A 401 suspends it until the login prompt resolves;
    /// any other response (or a send failure) is returned as is.
    pub async fn send(&self, request: RequestSpec) -> Result<HttpResponse, AuthError> {
        let response = self.transport.send(&request).await?;
        if !response.is_unauthorized() {
            return Ok(response);
        }

        let waiting = self.suspend(request);
        waiting.await.unwrap_or(Err(AuthError::Abandoned))
    }

    fn suspend(&self, request: RequestSpec) -> oneshot::Receiver<Outcome> {
        info!(method = %request.method, path = %request.path, "Login required, suspending request");
        let waiting = self.ledger.suspend(request.clone());
        self.login_required(request);
        waiting
    }

    fn login_required(&self, request: RequestSpec) {
        self.events.publish(AuthEvent::LoginRequired { request });
        self.guard.ensure_prompt_visible();
    }

    /// React to a session event. The cycle was already ended when the event
    /// was published, so only `LoginConfirmed` has work left: the resend.
    pub async fn handle_event(&self, event: &AuthEvent) {
        match event {
            AuthEvent::LoginConfirmed(_) => {
                self.resend_all().await;
            }
            AuthEvent::LoginCancelled { .. } | AuthEvent::LoginRequired { .. } => {}
        }
    }

    /// Re-issue every request released by a confirmed login and deliver each
    /// new outcome.
    pub async fn resend_all(&self) -> usize {
        let drained = self.ledger.take_released();
        let count = drained.len();
        if count == 0 {
            return 0;
        }

        info!(count, "Resending suspended requests");
        join_all(drained.into_iter().map(|entry| self.resend(entry))).await;
        count
    }

    async fn resend(&self, entry: SuspendedRequest) {
        debug!(path = %entry.request.path, waited_ms = entry.waited_ms(), "Resending request");
        match self.transport.send(&entry.request).await {
            Ok(response) if response.is_unauthorized() => {
                // Still not authorized: the caller waits on the next cycle
                warn!(path = %entry.request.path, "Resent request rejected again");
                let request = entry.request.clone();
                self.ledger.requeue(entry);
                self.login_required(request);
            }
            outcome => entry.deliver(outcome),
        }
    }

    /// Subscribe to the event bus and apply session events to the ledger.
    /// The task stops once the interceptor is dropped.
    pub fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.events.subscribe();
        let interceptor: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(interceptor) = interceptor.upgrade() else {
                    break;
                };
                interceptor.handle_event(&event).await;
            }
            debug!("Interceptor listener stopped");
        })
    }
}
