//! Bearer token lifecycle: the token endpoint exchange and the background refresher that keeps
//! the [`AccessTokenStore`](crate::auth::AccessTokenStore) current.
//!
//! [`TokenRefresher::start`] performs one synchronous fetch and fails fast when it is rejected.
//! Afterwards a single background task sleeps until `lifetime - expiry_delta`, fetches again, and
//! falls back to a fixed backoff whenever a fetch fails. The task never gives up on its own; only
//! [`RefresherHandle`] stops it.

mod metrics;
mod refresher;
mod response;

pub use metrics::{RefreshMetrics, RefreshSnapshot};
pub use refresher::*;
pub use response::*;
