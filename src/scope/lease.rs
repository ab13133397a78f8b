//! # Lease: a resource with a guaranteed release.
//!
//! Resources that need an explicit close (response bodies, file handles, sockets
//! borrowed from a pool) are wrapped together with their release action. The
//! action runs when the lease is dropped, including early returns via `?` and
//! unwinding panics, or earlier via [`Lease::release`].

use std::fmt;
use std::ops::{Deref, DerefMut};

/// Owned resource whose release action runs exactly once.
///
/// # Example
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use lifeline::Lease;
///
/// let closed = AtomicUsize::new(0);
/// {
///     let mut body = Lease::new(Vec::<u8>::new(), |_| {
///         closed.fetch_add(1, Ordering::SeqCst);
///     });
///     body.extend_from_slice(b"payload");
///     assert_eq!(body.len(), 7);
/// }
/// assert_eq!(closed.load(Ordering::SeqCst), 1);
/// ```
pub struct Lease<R, F>
where
    F: FnOnce(R),
{
    resource: Option<R>,
    release: Option<F>,
}

impl<R, F> Lease<R, F>
where
    F: FnOnce(R),
{
    /// Wraps `resource`; `release` will receive it back exactly once.
    pub fn new(resource: R, release: F) -> Self {
        Self {
            resource: Some(resource),
            release: Some(release),
        }
    }

    /// Releases the resource now instead of at scope end.
    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        if let (Some(resource), Some(release)) = (self.resource.take(), self.release.take()) {
            release(resource);
        }
    }
}

impl<R, F> Deref for Lease<R, F>
where
    F: FnOnce(R),
{
    type Target = R;

    fn deref(&self) -> &R {
        // `resource` is only taken by `run_release`, which consumes or drops the lease
        match self.resource.as_ref() {
            Some(r) => r,
            None => unreachable!("lease accessed after release"),
        }
    }
}

impl<R, F> DerefMut for Lease<R, F>
where
    F: FnOnce(R),
{
    fn deref_mut(&mut self) -> &mut R {
        match self.resource.as_mut() {
            Some(r) => r,
            None => unreachable!("lease accessed after release"),
        }
    }
}

impl<R, F> Drop for Lease<R, F>
where
    F: FnOnce(R),
{
    fn drop(&mut self) {
        self.run_release();
    }
}

impl<R: fmt::Debug, F> fmt::Debug for Lease<R, F>
where
    F: FnOnce(R),
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("resource", &self.resource)
            .finish()
    }
}

/// Opens a resource and binds its release action.
///
/// An `open` failure is returned as-is; nothing needs releasing in that case.
pub fn acquire<R, E, O, F>(open: O, release: F) -> Result<Lease<R, F>, E>
where
    O: FnOnce() -> Result<R, E>,
    F: FnOnce(R),
{
    open().map(|r| Lease::new(r, release))
}

/// Runs `body` once per item with a resource acquired and released inside that iteration.
///
/// Stops at the first error from `open` or `body` and returns it; the failing
/// iteration's resource (if any) is released before returning. Returns the number
/// of completed iterations otherwise.
pub fn for_each_scoped<I, R, E, O, F, B>(
    items: I,
    mut open: O,
    mut release: F,
    mut body: B,
) -> Result<usize, E>
where
    I: IntoIterator,
    O: FnMut(&I::Item) -> Result<R, E>,
    F: FnMut(R),
    B: FnMut(I::Item, &mut R) -> Result<(), E>,
{
    let mut done = 0;
    for item in items {
        let resource = open(&item)?;
        let mut lease = Lease::new(resource, |r| release(r));
        body(item, &mut *lease)?;
        done += 1;
    }
    Ok(done)
}
