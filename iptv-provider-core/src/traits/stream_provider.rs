use crate::models::error::ProviderError;
use crate::models::state::LifecycleState;

/// Public contract of anything that hands out streams by channel.
///
/// Implemented by [`ProviderCore`](crate::provider::base::ProviderCore) and
/// [`ChannelBinding`](crate::provider::binding::ChannelBinding). Composite
/// providers (pools, multi-source failover) implement the same trait so they
/// can stand in for a single provider.
pub trait StreamProvider: Send + Sync {
    /// Consumer-facing handle returned by a successful start.
    type Managed;

    /// Provider specialised to a single channel.
    type Binding: StreamProvider<Managed = Self::Managed>;

    /// Acquire a stream and register it under `channel_id`.
    ///
    /// Fails with `NoChannelSelected` when unbound and `InUse` when the
    /// shared identity is already started.
    fn start(&self, channel_id: &str) -> Result<Self::Managed, ProviderError>;

    /// Release the running stream. `NotStarted` if nothing is running.
    fn stop(&self) -> Result<(), ProviderError>;

    fn bind_to_channel(&self, channel: &str) -> Self::Binding;

    /// Display name of the bound channel, empty when unbound.
    fn describe(&self) -> String;

    fn state(&self) -> LifecycleState;

    /// Callback-shaped `start`: exactly one of the two closures runs, once.
    fn start_with<F, E>(&self, channel_id: &str, on_ready: F, on_error: E)
    where
        F: FnOnce(Self::Managed),
        E: FnOnce(ProviderError),
        Self: Sized,
    {
        match self.start(channel_id) {
            Ok(managed) => on_ready(managed),
            Err(err) => on_error(err),
        }
    }
}
