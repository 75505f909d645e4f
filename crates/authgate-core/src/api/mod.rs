//! HTTP plumbing between the application and the backend.
//!
//! This module provides the `Transport` seam (with a `reqwest` implementation),
//! the `AuthError` taxonomy, and the `AuthInterceptor`, which parks requests
//! answered with 401 in a `PendingLedger` until the login prompt resolves.

pub mod error;
pub mod interceptor;
pub mod ledger;
pub mod transport;

pub use error::AuthError;
pub use interceptor::AuthInterceptor;
pub use ledger::{PendingLedger, SuspendedRequest};
pub use transport::{HttpResponse, RequestSpec, ReqwestTransport, Transport};
