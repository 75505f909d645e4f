//! Authgate core - keeps HTTP callers waiting through a re-login.
//!
//! Requests answered with 401 are suspended while a single login prompt is
//! shown. A successful login resends them all and each original caller gets
//! the new result; cancelling the prompt rejects them all.
//!
//! ```text
//! 401 -> AuthInterceptor (ledger) -> DialogGuard -> LoginPresenter
//!                                          |
//!        LoginController -> AuthService::login -> LoginConfirmed -> resend all
//!                        -> cancel            -> LoginCancelled -> reject all
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod events;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

pub use api::{AuthError, AuthInterceptor, HttpResponse, RequestSpec, ReqwestTransport, Transport};
pub use auth::{AuthService, DialogGuard, LoginController, LoginPresenter, SessionUser};
pub use config::{AuthConfig, Endpoints};
pub use events::{AuthEvent, EventBus, CANCELLED_BY_USER};

/// The wired-up services for one application session.
pub struct AuthContext {
    pub events: Arc<EventBus>,
    pub auth: Arc<AuthService>,
    pub guard: Arc<DialogGuard>,
    pub interceptor: Arc<AuthInterceptor>,
}

impl AuthContext {
    /// Wire the services over `transport`. The guard is built by `make_guard`
    /// so callers can pre-fill the username or add a translator.
    /// Must be called inside a tokio runtime (the ledger listener is spawned).
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: Endpoints,
        presenter: Arc<dyn LoginPresenter>,
        make_guard: impl FnOnce(DialogGuard) -> DialogGuard,
    ) -> Self {
        let events = Arc::new(EventBus::new());
        let auth = AuthService::new(Arc::clone(&transport), endpoints, Arc::clone(&events));
        let guard = Arc::new(make_guard(DialogGuard::new(Arc::clone(&auth), presenter)));
        let interceptor = AuthInterceptor::new(transport, &auth, Arc::clone(&guard));
        interceptor.spawn_listener();

        Self {
            events,
            auth,
            guard,
            interceptor,
        }
    }

    /// Wire the services over a `reqwest` transport built from `config`
    pub fn connect(
        config: &AuthConfig,
        presenter: Arc<dyn LoginPresenter>,
        make_guard: impl FnOnce(DialogGuard) -> DialogGuard,
    ) -> Result<Self, AuthError> {
        let transport = Arc::new(ReqwestTransport::new(config)?);
        Ok(Self::new(transport, config.endpoints.clone(), presenter, make_guard))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{HoldingPresenter, MockTransport};
    use reqwest::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_context_end_to_end() {
        let transport = MockTransport::new();
        transport.respond("/api/report", StatusCode::UNAUTHORIZED, json!({}));
        transport.respond("/api/report", StatusCode::OK, json!({"rows": 3}));
        transport.respond("/api/auth/login", StatusCode::OK, json!({"id": 7, "name": "Bob"}));
        let presenter = Arc::new(HoldingPresenter::default());

        let ctx = AuthContext::new(transport.clone(), Endpoints::default(), presenter.clone(), |guard| {
            guard.with_default_username("bob")
        });
        let held_user = ctx.auth.session();

        let interceptor = ctx.interceptor.clone();
        let caller = tokio::spawn(async move { interceptor.send(RequestSpec::get("/api/report")).await });
        while ctx.interceptor.pending() == 0 {
            tokio::task::yield_now().await;
        }

        let mut controller = presenter.take().expect("prompt opened");
        assert_eq!(controller.username(), "bob");
        controller.set_password("pw");
        controller.submit().await;

        let response = caller.await.expect("task").expect("delivered");
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(held_user.get("name"), Some(json!("Bob")));

        // Settled-by-login does not settle the query; it still asks once
        transport.respond("/api/auth/login", StatusCode::OK, json!({"id": 7, "name": "Bob"}));
        let user = ctx.auth.get_logged_user().await.expect("whoami");
        assert!(user.same_as(&held_user));
    }
}
