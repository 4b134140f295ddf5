//! Authenticated access to the courier backend.
//!
//! Every request reads the current access token from the session store and
//! sends it as a bearer credential. Failures come back as [`ApiError`] with a
//! kind callers can match on; nothing is retried unless the refresh policy is on.

mod client;
mod debug_trace;
mod error;
mod resources;

pub use client::{ApiClient, USER_AGENT};
pub use debug_trace::DEBUG_TRACE_ENV;
pub use error::{ApiError, ApiErrorKind, ApiResult};
pub use resources::Resource;
