//! Declarative API calls and the executor that runs them.
//!
//! A [`CallSpec`] is an immutable description of one request (method, path, query, body,
//! override token, rate limiter, error-list parsing) bound to the response type it decodes into.
//! [`CallExecutor`] turns it into a signed request, waits on the rate limiter, and retries while
//! the upstream answers HTTP 429.

mod context;
mod executor;
mod result;
mod spec;

pub use context::*;
pub use executor::*;
pub use result::*;
pub use spec::*;
