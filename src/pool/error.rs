/// Failure modes of checking a connection out of a pool.
///
/// The two variants are deliberately distinct: a saturated pool and a
/// broker that refuses connections call for different reactions from the
/// caller (back off and retry vs. surface the connectivity problem).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The pool stayed saturated for the whole wait window.
    #[error("timed out waiting for a free connection slot")]
    Timeout,
    /// Establishing a fresh connection failed.
    ///
    /// Carries the factory's error verbatim; the pool does not retry on
    /// the caller's behalf.
    #[error("failed to establish a new broker connection")]
    Connect(#[source] anyhow::Error),
}
