//! Requests parked on a 401 until the login prompt resolves.
//!
//! Each entry owns the one-shot sender back to its original caller, so an
//! entry can only ever be delivered once: by a resend or by a rejection.
//!
//! A login cycle ends synchronously, when the login is confirmed or cancelled:
//! `release` moves the cycle's entries aside for resending and `reject_all`
//! fails them. Anything suspended afterwards belongs to the next cycle.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::{AuthError, HttpResponse, RequestSpec};

pub type Outcome = Result<HttpResponse, AuthError>;

/// A suspended HTTP call and the channel to its waiting caller.
#[derive(Debug)]
pub struct SuspendedRequest {
    pub request: RequestSpec,
    pub suspended_at: DateTime<Utc>,
    responder: oneshot::Sender<Outcome>,
}

impl SuspendedRequest {
    /// Hand the final outcome to the original caller
    pub fn deliver(self, outcome: Outcome) {
        if self.responder.send(outcome).is_err() {
            debug!(path = %self.request.path, "Caller went away before delivery");
        }
    }

    pub fn waited_ms(&self) -> i64 {
        (Utc::now() - self.suspended_at).num_milliseconds()
    }
}

#[derive(Default)]
pub struct PendingLedger {
    entries: Mutex<Vec<SuspendedRequest>>,
    released: Mutex<Vec<SuspendedRequest>>,
}

impl PendingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<SuspendedRequest>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn released(&self) -> MutexGuard<'_, Vec<SuspendedRequest>> {
        self.released.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Park a request; the receiver resolves when the ledger terminates it.
    pub fn suspend(&self, request: RequestSpec) -> oneshot::Receiver<Outcome> {
        let (tx, rx) = oneshot::channel();
        self.requeue(SuspendedRequest {
            request,
            suspended_at: Utc::now(),
            responder: tx,
        });
        rx
    }

    /// Put an already suspended request back for the next login cycle
    pub fn requeue(&self, entry: SuspendedRequest) {
        let mut entries = self.entries();
        debug!(path = %entry.request.path, pending = entries.len() + 1, "Request suspended");
        entries.push(entry);
    }

    /// Empty the ledger, ending the current cycle.
    /// Requests suspended after this call belong to the next cycle.
    pub fn drain(&self) -> Vec<SuspendedRequest> {
        std::mem::take(&mut *self.entries())
    }

    /// End the current cycle after a confirmed login. Its entries wait for
    /// `take_released` to resend them.
    pub fn release(&self) -> usize {
        let drained = self.drain();
        let count = drained.len();
        if count > 0 {
            debug!(count, "Released suspended requests for resend");
            self.released().extend(drained);
        }
        count
    }

    /// Entries released by confirmed logins and not yet resent
    pub fn take_released(&self) -> Vec<SuspendedRequest> {
        std::mem::take(&mut *self.released())
    }

    /// Fail every suspended request with the cancellation reason
    pub fn reject_all(&self, reason: &str) -> usize {
        let drained = self.drain();
        let count = drained.len();
        for entry in drained {
            entry.deliver(Err(AuthError::LoginCancelled(reason.to_string())));
        }
        if count > 0 {
            warn!(count, reason = %reason, "Rejected suspended requests");
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
