use std::{fmt, future::Future, sync::Arc};

use crate::ValueStream;

/// A backend capable of turning a URI into a readable byte stream.
///
/// Openers are registered under a URI scheme in an
/// [`crate::OpenerRegistry`], which dispatches [`crate::OpenerRegistry::resolve`]
/// calls to them.
#[async_trait::async_trait]
pub trait Opener: Send + Sync + fmt::Debug {
    /// Open the resource identified by `uri`.
    ///
    /// Receives the full, unmodified URI that was passed to the registry.
    /// Any scheme-specific decomposition (host as bucket, path as key, ...)
    /// is up to the implementation.
    ///
    /// The returned stream is owned by the caller. Dropping it releases the
    /// underlying resource.
    async fn open(&self, uri: &str) -> Result<ValueStream, anyhow::Error>;
}

#[async_trait::async_trait]
impl<O: Opener + ?Sized> Opener for Arc<O> {
    async fn open(&self, uri: &str) -> Result<ValueStream, anyhow::Error> {
        self.as_ref().open(uri).await
    }
}

pub type DynOpener = Arc<dyn Opener>;

/// An [`Opener`] backed by an async closure.
///
/// Construct with [`open_fn`].
#[derive(Clone)]
pub struct OpenFn<F> {
    f: F,
}

impl<F> fmt::Debug for OpenFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenFn").finish_non_exhaustive()
    }
}

/// Wrap an async closure as an [`Opener`].
///
/// The closure receives an owned copy of the URI.
///
/// ```
/// use uriopen::{OpenerRegistry, open_fn, stream_from_bytes};
///
/// let registry = OpenerRegistry::new().register(
///     "echo",
///     open_fn(|uri: String| async move { Ok(stream_from_bytes(uri)) }),
/// );
/// assert!(registry.contains("echo"));
/// ```
pub fn open_fn<F, Fut>(f: F) -> OpenFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ValueStream, anyhow::Error>> + Send + 'static,
{
    OpenFn { f }
}

#[async_trait::async_trait]
impl<F, Fut> Opener for OpenFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ValueStream, anyhow::Error>> + Send + 'static,
{
    async fn open(&self, uri: &str) -> Result<ValueStream, anyhow::Error> {
        (self.f)(uri.to_owned()).await
    }
}
