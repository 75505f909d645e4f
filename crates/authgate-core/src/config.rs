//! Backend connection settings.
//!
//! Endpoint paths are relative to `base_url` unless they are absolute URLs.

use serde::{Deserialize, Serialize};

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// `POST {username, password}`
    pub login: String,
    /// `GET`, any response clears the session
    pub logout: String,
    /// `GET`, body is the current user (`{}` when anonymous)
    pub logged_user: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            login: "/api/auth/login".to_string(),
            logout: "/api/auth/logout".to_string(),
            logged_user: "/api/auth/login".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub base_url: String,
    pub endpoints: Endpoints,
    pub request_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoints: Endpoints::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}
