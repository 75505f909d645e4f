//! Login, logout and "who am I" against the backend.
//!
//! Successful calls write the session cache first, end the current cycle of
//! suspended requests, and then publish `LoginConfirmed`. The listener on the
//! bus resends what was released.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::session::{SessionCache, SessionUser, UserData};
use crate::api::{AuthError, HttpResponse, PendingLedger, RequestSpec, Transport};
use crate::config::Endpoints;
use crate::events::{AuthEvent, EventBus};

type UserQuery = Shared<BoxFuture<'static, Result<SessionUser, AuthError>>>;

enum QueryState {
    /// Never queried, invalidated, or the last query failed
    Absent,
    /// One backend call outstanding; later callers attach to it
    InFlight(UserQuery),
    /// Result is in the session cache
    Settled,
}

/// Observable phase of the logged-user query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Absent,
    InFlight,
    Settled,
}

pub struct AuthService {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    cache: SessionCache,
    events: Arc<EventBus>,
    pending: Arc<PendingLedger>,
    query: Mutex<QueryState>,
}

impl AuthService {
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints, events: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            endpoints,
            cache: SessionCache::new(),
            events,
            pending: Arc::new(PendingLedger::new()),
            query: Mutex::new(QueryState::Absent),
        })
    }

    fn query_state(&self) -> MutexGuard<'_, QueryState> {
        self.query.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The session's user record (anonymous until a login or query succeeds)
    pub fn session(&self) -> SessionUser {
        self.cache.get()
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Requests suspended on the current login cycle
    pub(crate) fn pending_requests(&self) -> &Arc<PendingLedger> {
        &self.pending
    }

    pub fn query_status(&self) -> QueryStatus {
        match *self.query_state() {
            QueryState::Absent => QueryStatus::Absent,
            QueryState::InFlight(_) => QueryStatus::InFlight,
            QueryState::Settled => QueryStatus::Settled,
        }
    }

    /// Current user from the backend, fetched at most once until invalidated.
    ///
    /// Concurrent callers share a single backend call and all receive the
    /// session's `SessionUser`. A failed call rejects every attached caller and
    /// leaves the query absent so the next call retries.
    pub async fn get_logged_user(self: &Arc<Self>) -> Result<SessionUser, AuthError> {
        let query = {
            let mut state = self.query_state();
            match &*state {
                QueryState::InFlight(query) => {
                    debug!("Logged user query in flight, attaching");
                    query.clone()
                }
                QueryState::Settled => return Ok(self.cache.get()),
                QueryState::Absent => {
                    let service = Arc::clone(self);
                    let query = async move { service.fetch_logged_user().await }
                        .boxed()
                        .shared();
                    *state = QueryState::InFlight(query.clone());
                    query
                }
            }
        };
        query.await
    }

    /// Forget a settled query so the next `get_logged_user` asks the backend.
    /// An in-flight query is left alone.
    pub fn invalidate_logged_user(&self) {
        let mut state = self.query_state();
        if matches!(*state, QueryState::Settled) {
            *state = QueryState::Absent;
        }
    }

    async fn fetch_logged_user(&self) -> Result<SessionUser, AuthError> {
        let request = RequestSpec::get(self.endpoints.logged_user.as_str());
        let result = match self.transport.send(&request).await {
            Ok(response) => response.error_for_status().and_then(|r| parse_user(&r)),
            Err(e) => Err(e),
        };

        let mut state = self.query_state();
        match result {
            Ok(data) => {
                self.cache.replace_contents(data);
                *state = QueryState::Settled;
                drop(state);

                let user = self.cache.get();
                info!(anonymous = user.is_anonymous(), "Logged user resolved");
                self.confirm_login();
                Ok(user)
            }
            Err(e) => {
                *state = QueryState::Absent;
                warn!(error = %e, "Logged user query failed");
                Err(e)
            }
        }
    }

    /// Send credentials; on success cache the returned user and confirm the login.
    /// Failures come back untouched for the prompt to render.
    ///
    /// This is the programmatic login. It does not close a login prompt that
    /// is on screen: requests suspended before the call are resent, and a
    /// later 401 joins the open prompt, which still settles its own cycle.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), AuthError> {
        self.authenticate(username, password).await?;
        self.confirm_login();
        Ok(())
    }

    /// Credential exchange and cache write, without the broadcast.
    /// The prompt closes itself between this and `confirm_login`, so a 401
    /// raised by a resent request always finds the prompt free to reopen.
    pub(crate) async fn authenticate(&self, username: &str, password: &str) -> Result<(), AuthError> {
        let request = RequestSpec::post(
            self.endpoints.login.as_str(),
            json!({ "username": username, "password": password }),
        );

        let response = self.transport.send(&request).await?.error_for_status()?;
        let data = parse_user(&response)?;

        self.cache.replace_contents(data);
        info!(username = %username, "Login successful");
        Ok(())
    }

    /// Release the current cycle for resend and broadcast the cached user.
    pub(crate) fn confirm_login(&self) {
        self.pending.release();
        self.events.publish(AuthEvent::LoginConfirmed(self.cache.get()));
    }

    /// Tell the backend to drop the session, then confirm the anonymous user.
    /// Any HTTP response counts; only a failed send keeps the cache.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let request = RequestSpec::get(self.endpoints.logout.as_str());
        let response = self.transport.send(&request).await?;
        if !response.is_success() {
            debug!(status = %response.status, "Logout returned non-success, clearing anyway");
        }

        self.cache.clear();
        info!("Logged out");
        self.confirm_login();
        Ok(())
    }

    /// Reject the current cycle and announce that the user abandoned the login.
    /// Requests suspended after this returns wait for the next prompt.
    pub fn login_cancelled(&self, reason: &str) {
        info!(reason = %reason, "Login cancelled");
        self.pending.reject_all(reason);
        self.events.publish(AuthEvent::LoginCancelled {
            reason: reason.to_string(),
        });
    }
}

/// Response body as user data; an empty body or `null` is the anonymous user.
fn parse_user(response: &HttpResponse) -> Result<UserData, AuthError> {
    if response.body.trim().is_empty() {
        return Ok(UserData::new());
    }
    match response.json::<Value>()? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(UserData::new()),
        other => Err(AuthError::InvalidResponse(format!(
            "expected user object, got {}",
            other
        ))),
    }
}
