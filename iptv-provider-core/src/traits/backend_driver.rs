use crate::models::error::BackendError;
use crate::models::stream_metadata::Acquisition;

/// Interface for concrete stream sources (HTTP relay, raw URL, VLC
/// transcode, stream daemon, ...).
///
/// A backend only knows how to open and close a stream. Everything else
/// (in-use locking, registry hand-off, channel bindings) lives in
/// [`ProviderCore`](crate::provider::base::ProviderCore).
pub trait BackendDriver: Send + Sync + 'static {
    /// Handle to an open stream. The core keeps one clone while the stream
    /// runs and gives the other to the registry, so it should be cheap to
    /// clone (typically `Arc`-backed).
    type Stream: Clone + Send + Sync + 'static;

    /// Open a stream for `channel`, the name the provider is bound to.
    ///
    /// May block; the core never holds its lock across this call.
    fn begin_acquire(&self, channel: &str) -> Result<Acquisition<Self::Stream>, BackendError>;

    /// Release a stream previously returned by `begin_acquire`.
    ///
    /// Called at most once per acquisition. Must tolerate a stream whose
    /// resources are already partially gone.
    fn end_acquire(&self, stream: Self::Stream) -> Result<(), BackendError>;

    /// Short name used in log lines.
    fn name(&self) -> &str {
        "backend"
    }
}
