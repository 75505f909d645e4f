//! Session state and the login prompt protocol.
//!
//! This module provides:
//! - `SessionCache` / `SessionUser`: the single logged-in user record
//! - `AuthService`: login, logout and the deduplicated "who am I" query
//! - `DialogGuard`: at most one login prompt at a time
//! - `LoginController`: form state machine driven by the presenter

pub mod dialog;
pub mod prompt;
pub mod service;
pub mod session;

pub use dialog::{DialogGuard, DialogHandle, DialogOutcome, DialogState, LoginPresenter};
pub use prompt::{LoginAttempt, LoginController, LoginFocus, PendingLogin, PromptState, Translator, UNKNOWN_ERROR};
pub use service::{AuthService, QueryStatus};
pub use session::{SessionCache, SessionUser, UserData};
