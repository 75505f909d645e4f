//! Login form state behind the prompt.
//!
//! The presenter feeds keystrokes/values in and renders `username()`,
//! `error()`, `is_working()` and `focus()`; the controller talks to the
//! `AuthService` and closes the prompt.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use super::dialog::DialogHandle;
use super::AuthService;
use crate::api::AuthError;

// ============================================================================
// Constants
// ============================================================================

/// Maximum length for username input.
const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Shown when a failed login carries no server error code
pub const UNKNOWN_ERROR: &str = "#ERR_UNKNOWN_SERVER_RESPONSE";

/// Maps a server error code to the text shown to the user
pub type Translator = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    /// Form is editable (possibly showing the last error)
    Editing,
    /// Credentials sent, waiting for the backend
    Submitting,
    /// Login succeeded; prompt dismissed
    ClosedSuccess,
    /// User gave up; suspended requests were rejected
    ClosedCancelled,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFocus {
    Username,
    Password,
    Button,
}

impl LoginFocus {
    pub fn next(&self) -> Self {
        match self {
            LoginFocus::Username => LoginFocus::Password,
            LoginFocus::Password => LoginFocus::Button,
            LoginFocus::Button => LoginFocus::Username,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            LoginFocus::Username => LoginFocus::Button,
            LoginFocus::Password => LoginFocus::Username,
            LoginFocus::Button => LoginFocus::Password,
        }
    }
}

/// Form state of one open prompt. Dropping the controller while the form is
/// editable cancels the login; once a submit is outstanding, the
/// `PendingLogin` decides how the prompt ends.
pub struct LoginController {
    auth: Arc<AuthService>,
    handle: Option<DialogHandle>,
    dialog_id: u64,
    translator: Option<Translator>,

    username: String,
    password: String,
    focus: LoginFocus,
    state: PromptState,
    error: Option<String>,
}

impl LoginController {
    pub(crate) fn new(
        auth: Arc<AuthService>,
        handle: DialogHandle,
        username: &str,
        translator: Option<Translator>,
    ) -> Self {
        let username: String = username
            .chars()
            .filter(|c| is_valid_input_char(*c))
            .take(MAX_USERNAME_LENGTH)
            .collect();
        let focus = if username.is_empty() {
            LoginFocus::Username
        } else {
            LoginFocus::Password
        };

        Self {
            auth,
            dialog_id: handle.id(),
            handle: Some(handle),
            translator,
            username,
            password: String::new(),
            focus,
            state: PromptState::Editing,
            error: None,
        }
    }

    pub fn dialog_id(&self) -> u64 {
        self.dialog_id
    }

    pub fn state(&self) -> PromptState {
        self.state
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    pub fn focus(&self) -> LoginFocus {
        self.focus
    }

    /// Message from the last failed attempt
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// True while credentials are with the backend (spinner on, form disabled)
    pub fn is_working(&self) -> bool {
        self.state == PromptState::Submitting
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, PromptState::ClosedSuccess | PromptState::ClosedCancelled)
    }

    pub fn can_submit(&self) -> bool {
        self.state == PromptState::Editing && !self.username.is_empty() && !self.password.is_empty()
    }

    // =========================================================================
    // Form input
    // =========================================================================

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_prev(&mut self) {
        self.focus = self.focus.prev();
    }

    /// Type a character into the focused field. Returns false if rejected.
    pub fn input_char(&mut self, c: char) -> bool {
        if self.state != PromptState::Editing {
            return false;
        }
        match self.focus {
            LoginFocus::Username if can_add_username_char(self.username.chars().count(), c) => {
                self.username.push(c);
                true
            }
            LoginFocus::Password if can_add_password_char(self.password.chars().count(), c) => {
                self.password.push(c);
                true
            }
            _ => false,
        }
    }

    pub fn backspace(&mut self) {
        if self.state != PromptState::Editing {
            return;
        }
        match self.focus {
            LoginFocus::Username => {
                self.username.pop();
            }
            LoginFocus::Password => {
                self.password.pop();
            }
            LoginFocus::Button => {}
        }
    }

    /// Replace the username; invalid characters are dropped, length is capped.
    pub fn set_username(&mut self, value: &str) {
        if self.state != PromptState::Editing {
            return;
        }
        self.username.clear();
        for c in value.chars() {
            if can_add_username_char(self.username.chars().count(), c) {
                self.username.push(c);
            }
        }
    }

    pub fn set_password(&mut self, value: &str) {
        if self.state != PromptState::Editing {
            return;
        }
        self.password.clear();
        for c in value.chars() {
            if can_add_password_char(self.password.chars().count(), c) {
                self.password.push(c);
            }
        }
    }

    // =========================================================================
    // Submit / cancel
    // =========================================================================

    /// Send the form and wait for the outcome.
    /// Does nothing unless `can_submit()`.
    pub async fn submit(&mut self) -> PromptState {
        let Some(pending) = self.begin_submit() else {
            return self.state;
        };
        let attempt = pending.send().await;
        self.finish_submit(attempt);
        self.state
    }

    /// Enter `Submitting` and hand out the request to send. The prompt's
    /// outcome travels with it until `finish_submit` gets it back.
    /// Split from `finish_submit` for presenters that render while waiting.
    pub fn begin_submit(&mut self) -> Option<PendingLogin> {
        if !self.can_submit() {
            return None;
        }
        let handle = self.handle.take()?;
        self.state = PromptState::Submitting;
        self.error = None;
        Some(PendingLogin {
            auth: Arc::clone(&self.auth),
            handle,
            username: self.username.clone(),
            password: self.password.clone(),
        })
    }

    /// Apply the outcome of `PendingLogin::send`
    pub fn finish_submit(&mut self, attempt: LoginAttempt) {
        if self.state != PromptState::Submitting {
            return;
        }
        self.password.clear();
        match attempt.result {
            Ok(()) => {
                self.state = PromptState::ClosedSuccess;
            }
            Err(e) => {
                warn!(error = %e, "Login attempt failed");
                let code = e.server_code().unwrap_or(UNKNOWN_ERROR);
                self.error = Some(self.translate(code));
                self.handle = attempt.handle;
                self.state = PromptState::Editing;
                self.focus = LoginFocus::Password;
            }
        }
    }

    /// Dismiss the prompt and reject every suspended request.
    /// Not available while a submit is outstanding.
    pub fn cancel(&mut self) -> bool {
        if self.state != PromptState::Editing {
            return false;
        }
        self.state = PromptState::ClosedCancelled;
        self.password.clear();
        if let Some(handle) = self.handle.take() {
            handle.cancel();
        }
        true
    }

    fn translate(&self, code: &str) -> String {
        match self.translator {
            Some(ref translate) => translate(code),
            None => code.to_string(),
        }
    }
}

impl fmt::Debug for LoginController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginController")
            .field("dialog_id", &self.dialog_id)
            .field("username", &self.username)
            .field("state", &self.state)
            .field("focus", &self.focus)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

/// Credentials captured by `begin_submit`, ready to send.
///
/// Holds the prompt's outcome while the backend answers: a success closes the
/// prompt and confirms the login even if the controller is gone, and dropping
/// an unsent or unfinished login cancels it.
pub struct PendingLogin {
    auth: Arc<AuthService>,
    handle: DialogHandle,
    username: String,
    password: String,
}

impl PendingLogin {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub async fn send(self) -> LoginAttempt {
        let result = self.auth.authenticate(&self.username, &self.password).await;
        match result {
            Ok(()) => {
                self.handle.confirm();
                LoginAttempt {
                    result: Ok(()),
                    handle: None,
                }
            }
            Err(e) => LoginAttempt {
                result: Err(e),
                handle: Some(self.handle),
            },
        }
    }
}

impl fmt::Debug for PendingLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingLogin")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Result of `PendingLogin::send`, for `finish_submit`.
/// A failed attempt keeps the prompt open; dropping it unapplied cancels.
#[derive(Debug)]
pub struct LoginAttempt {
    result: Result<(), AuthError>,
    handle: Option<DialogHandle>,
}

impl LoginAttempt {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&AuthError> {
        self.result.as_ref().err()
    }
}

// ============================================================================
// Input validation helpers
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a username character should be accepted
pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && is_valid_input_char(c)
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}
