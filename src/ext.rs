//! Extension seams between the call executor and its credential sources.
//!
//! The executor never talks to the token refresher or the signer directly. It asks an
//! [`AccessTokenSource`] for the bearer token and hands the finished request to a
//! [`RequestSignerExt`], so embedding crates (and tests) can substitute either side.

pub mod request_signer;
pub mod token_source;

pub use request_signer::*;
pub use token_source::*;
