use crate::models::error::RegistryError;
use crate::models::stream_metadata::StreamMetadata;

/// Invoked by a registry when it wants the stream behind a channel to end
/// (e.g. the last consumer went away).
pub type TeardownCallback = Box<dyn FnOnce() + Send + 'static>;

/// Downstream distribution of ready streams to consumers.
pub trait StreamRegistry: Send + Sync + 'static {
    type Stream: Send + 'static;

    /// Handle consumers read from.
    type Managed;

    /// Register `stream` under `channel_id` and arm `on_teardown`.
    ///
    /// The callback may be invoked from any thread, including synchronously
    /// from inside this call.
    fn register_channel(
        &self,
        channel_id: &str,
        stream: Self::Stream,
        metadata: &StreamMetadata,
        on_teardown: TeardownCallback,
    ) -> Result<Self::Managed, RegistryError>;
}
