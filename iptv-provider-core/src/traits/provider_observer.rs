use crate::models::error::ProviderError;
use crate::models::state::LifecycleState;

/// Lifecycle notifications for a provider identity.
///
/// Observers are attached to the shared identity, so they hear about every
/// binding of the provider. `channel` is the bound name of the provider or
/// binding the call went through (empty when unbound).
/// Called on the thread that drove the transition, never under the core's lock.
pub trait ProviderObserver: Send + Sync {
    /// The running stream was released and the identity is idle again.
    fn on_stopped(&self, channel: &str);

    fn on_state_changed(&self, channel: &str, state: LifecycleState) {
        let _ = (channel, state);
    }

    /// A `start` call failed.
    fn on_error(&self, channel: &str, error: &ProviderError) {
        let _ = (channel, error);
    }
}
