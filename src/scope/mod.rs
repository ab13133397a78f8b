//! # Scoped resource acquisition.
//!
//! - [`Lease`] resource plus release action, run exactly once on every exit path
//! - [`acquire`] open a resource; failures go straight back to the caller
//! - [`for_each_scoped`] one acquisition and one release per loop iteration
//!
//! ```text
//! for item in items {
//!     open(item)? ──► Lease ──► body(item, &mut res)? ──► release(res)   (end of iteration)
//!                                     └── error/panic ──► release(res) ──► return
//! }
//! ```

mod lease;

pub use lease::{Lease, acquire, for_each_scoped};
