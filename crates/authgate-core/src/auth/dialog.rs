//! Keeps at most one login prompt open.
//!
//! Every 401 asks for the prompt; only the first one while no prompt is
//! pending actually opens it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use super::prompt::{LoginController, Translator};
use super::AuthService;
use crate::events::CANCELLED_BY_USER;

/// How a prompt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogOutcome {
    LoggedIn,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    /// No prompt has been opened yet
    None,
    /// Prompt `id` is open
    Pending(u64),
    /// The last prompt finished
    Settled(DialogOutcome),
}

/// Renders a login prompt. The presenter owns the controller for the life of
/// the prompt; dropping an open controller counts as a cancel.
pub trait LoginPresenter: Send + Sync {
    fn present(&self, controller: LoginController);
}

/// Link from an open prompt back to the guard that opened it.
///
/// Whoever holds the handle decides how the prompt ends: the controller while
/// the form is being edited, the `PendingLogin` while credentials are with the
/// backend. Dropping a handle that never settled cancels the login.
pub struct DialogHandle {
    id: u64,
    state: Arc<Mutex<DialogState>>,
    auth: Arc<AuthService>,
    open: bool,
}

impl DialogHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    fn settle(&mut self, outcome: DialogOutcome) {
        if !self.open {
            return;
        }
        self.open = false;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == DialogState::Pending(self.id) {
            *state = DialogState::Settled(outcome);
            debug!(dialog = self.id, ?outcome, "Login prompt settled");
        }
    }

    /// Close the prompt, then release the suspended requests and broadcast
    pub(crate) fn confirm(mut self) {
        self.settle(DialogOutcome::LoggedIn);
        self.auth.confirm_login();
    }

    /// Close the prompt, then reject the suspended requests and broadcast
    pub(crate) fn cancel(mut self) {
        self.settle(DialogOutcome::Cancelled);
        self.auth.login_cancelled(CANCELLED_BY_USER);
    }
}

impl Drop for DialogHandle {
    fn drop(&mut self) {
        if self.open {
            debug!(dialog = self.id, "Open login prompt dropped, cancelling");
            self.settle(DialogOutcome::Cancelled);
            self.auth.login_cancelled(CANCELLED_BY_USER);
        }
    }
}

impl std::fmt::Debug for DialogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogHandle")
            .field("id", &self.id)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

pub struct DialogGuard {
    state: Arc<Mutex<DialogState>>,
    next_id: AtomicU64,
    auth: Arc<AuthService>,
    presenter: Arc<dyn LoginPresenter>,
    default_username: String,
    translator: Option<Translator>,
}

impl DialogGuard {
    pub fn new(auth: Arc<AuthService>, presenter: Arc<dyn LoginPresenter>) -> Self {
        Self {
            state: Arc::new(Mutex::new(DialogState::None)),
            next_id: AtomicU64::new(1),
            auth,
            presenter,
            default_username: String::new(),
            translator: None,
        }
    }

    /// Pre-fill the username field of every prompt
    pub fn with_default_username(mut self, username: impl Into<String>) -> Self {
        self.default_username = username.into();
        self
    }

    /// Translate server error codes before they are shown
    pub fn with_translator(mut self, translator: Translator) -> Self {
        self.translator = Some(translator);
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, DialogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> DialogState {
        *self.lock_state()
    }

    pub fn is_prompt_open(&self) -> bool {
        matches!(self.state(), DialogState::Pending(_))
    }

    /// Open a prompt unless one is already pending. Returns true if opened.
    pub fn ensure_prompt_visible(&self) -> bool {
        let handle = {
            let mut state = self.lock_state();
            if let DialogState::Pending(id) = *state {
                debug!(dialog = id, "Login prompt already open");
                return false;
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            *state = DialogState::Pending(id);
            DialogHandle {
                id,
                state: Arc::clone(&self.state),
                auth: Arc::clone(&self.auth),
                open: true,
            }
        };

        info!(dialog = handle.id, "Opening login prompt");
        let controller = LoginController::new(
            Arc::clone(&self.auth),
            handle,
            &self.default_username,
            self.translator.clone(),
        );
        self.presenter.present(controller);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoints;
    use crate::events::{AuthEvent, EventBus};
    use crate::test_support::{HoldingPresenter, MockTransport};

    fn guard() -> (DialogGuard, Arc<HoldingPresenter>) {
        let transport = MockTransport::new();
        let auth = AuthService::new(transport, Endpoints::default(), Arc::new(EventBus::new()));
        let presenter = Arc::new(HoldingPresenter::default());
        (DialogGuard::new(auth, presenter.clone()), presenter)
    }

    #[test]
    fn test_repeated_requests_open_one_prompt() {
        let (guard, presenter) = guard();
        assert_eq!(guard.state(), DialogState::None);

        assert!(guard.ensure_prompt_visible());
        assert!(!guard.ensure_prompt_visible());
        assert!(!guard.ensure_prompt_visible());

        assert_eq!(presenter.count(), 1);
        assert!(guard.is_prompt_open());
    }

    #[test]
    fn test_settled_prompt_allows_a_new_one() {
        let (guard, presenter) = guard();
        guard.ensure_prompt_visible();

        let mut controller = presenter.take().expect("prompt opened");
        assert!(controller.cancel());
        assert_eq!(guard.state(), DialogState::Settled(DialogOutcome::Cancelled));

        assert!(guard.ensure_prompt_visible());
        let second = presenter.take().expect("second prompt");
        assert_ne!(second.dialog_id(), controller.dialog_id());
    }

    #[test]
    fn test_stale_handle_does_not_settle_newer_prompt() {
        let (guard, _presenter) = guard();
        let state = Arc::new(Mutex::new(DialogState::Pending(2)));
        let mut stale = DialogHandle {
            id: 1,
            state: Arc::clone(&state),
            auth: Arc::clone(&guard.auth),
            open: true,
        };
        stale.settle(DialogOutcome::LoggedIn);
        assert_eq!(*state.lock().unwrap(), DialogState::Pending(2));
    }

    #[test]
    fn test_dropped_handle_cancels_once() {
        let transport = MockTransport::new();
        let bus = Arc::new(EventBus::new());
        let mut events = bus.subscribe();
        let auth = AuthService::new(transport, Endpoints::default(), bus);
        let presenter = Arc::new(HoldingPresenter::default());
        let guard = DialogGuard::new(auth, presenter.clone());

        guard.ensure_prompt_visible();
        drop(presenter.take());

        assert_eq!(guard.state(), DialogState::Settled(DialogOutcome::Cancelled));
        assert!(matches!(events.try_recv(), Ok(AuthEvent::LoginCancelled { .. })));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_default_username_prefills_prompt() {
        let (guard, presenter) = guard();
        let guard = guard.with_default_username("bob");
        guard.ensure_prompt_visible();
        let controller = presenter.take().expect("prompt opened");
        assert_eq!(controller.username(), "bob");
    }
}
