//! Secret material and credential models: the bearer token snapshot published by the refresher and
//! the delegated signing credential cached by the request signer.

pub mod bearer;
pub mod credential;
pub mod secret;

pub use bearer::*;
pub use credential::*;
pub use secret::*;
