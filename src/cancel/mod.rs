//! # Cancellation primitives.
//!
//! - [`Token`] a cloneable cancel/deadline signal shared with every dependent
//! - [`CancelReason`] why a token fired (explicit cancel or deadline)
//! - [`TokenGuard`] cancels its token when dropped

mod token;

pub use token::{CancelReason, Token, TokenGuard};
pub(crate) use token::deadline_after;
