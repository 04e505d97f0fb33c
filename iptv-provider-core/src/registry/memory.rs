use std::collections::HashMap;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::error::RegistryError;
use crate::models::stream_metadata::StreamMetadata;
use crate::traits::stream_registry::{StreamRegistry, TeardownCallback};

/// Handle returned to the caller of a successful registration.
#[derive(Debug, Clone)]
pub struct ManagedStream<S> {
    pub channel_id: String,
    pub registration_id: Uuid,
    pub stream: S,
    pub metadata: StreamMetadata,
}

struct Entry<S> {
    registration_id: Uuid,
    stream: S,
    metadata: StreamMetadata,
    on_teardown: TeardownCallback,
}

/// In-process registry keyed by channel id.
///
/// Keeps one live stream per channel id. Registering an id that is already
/// present replaces the stale entry; its teardown callback is dropped
/// without being invoked.
///
/// The registry is not told when a provider is stopped by its caller. After
/// a caller-side `stop()`, call [`unregister`](Self::unregister) for that
/// channel id, otherwise the entry keeps handing out the released stream.
pub struct MemoryRegistry<S> {
    entries: Mutex<HashMap<String, Entry<S>>>,
    channel_limit: Option<usize>,
}

impl<S> MemoryRegistry<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            channel_limit: None,
        }
    }

    /// Refuse new channel ids once `limit` channels are registered.
    pub fn with_channel_limit(limit: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            channel_limit: Some(limit),
        }
    }

    pub fn contains(&self, channel_id: &str) -> bool {
        self.entries.lock().contains_key(channel_id)
    }

    /// Stream currently registered under `channel_id`, for a new consumer.
    ///
    /// May be a handle the backend already released if the provider was
    /// stopped directly and the channel was not unregistered.
    pub fn stream(&self, channel_id: &str) -> Option<S> {
        self.entries.lock().get(channel_id).map(|entry| entry.stream.clone())
    }

    pub fn metadata(&self, channel_id: &str) -> Option<StreamMetadata> {
        self.entries.lock().get(channel_id).map(|entry| entry.metadata.clone())
    }

    pub fn registration_id(&self, channel_id: &str) -> Option<Uuid> {
        self.entries.lock().get(channel_id).map(|entry| entry.registration_id)
    }

    /// Registered channel ids, sorted.
    pub fn channels(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// End the stream behind `channel_id`, e.g. when its last consumer left.
    ///
    /// Removes the entry, then runs its teardown callback outside the lock.
    /// Returns `false` if nothing was registered under that id.
    pub fn request_teardown(&self, channel_id: &str) -> bool {
        let removed = self.entries.lock().remove(channel_id);
        match removed {
            Some(entry) => {
                log::info!("tearing down channel '{}' ({})", channel_id, entry.registration_id);
                (entry.on_teardown)();
                true
            }
            None => false,
        }
    }

    /// Forget `channel_id` without asking its provider to stop, e.g. after
    /// the provider was stopped by its caller.
    pub fn unregister(&self, channel_id: &str) -> bool {
        self.entries.lock().remove(channel_id).is_some()
    }
}

impl<S> Default for MemoryRegistry<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> StreamRegistry for MemoryRegistry<S>
where
    S: Clone + Send + Sync + 'static,
{
    type Stream = S;
    type Managed = ManagedStream<S>;

    fn register_channel(
        &self,
        channel_id: &str,
        stream: S,
        metadata: &StreamMetadata,
        on_teardown: TeardownCallback,
    ) -> Result<ManagedStream<S>, RegistryError> {
        let registration_id = Uuid::new_v4();
        let replaced = {
            let mut entries = self.entries.lock();
            if let Some(limit) = self.channel_limit {
                if !entries.contains_key(channel_id) && entries.len() >= limit {
                    return Err(RegistryError::CapacityExceeded { limit });
                }
            }
            entries.insert(
                channel_id.to_string(),
                Entry {
                    registration_id,
                    stream: stream.clone(),
                    metadata: metadata.clone(),
                    on_teardown,
                },
            )
        };

        if let Some(stale) = replaced {
            log::warn!(
                "channel '{}' re-registered, dropping stale registration {}",
                channel_id,
                stale.registration_id
            );
        }
        log::debug!("registered channel '{}' ({})", channel_id, registration_id);

        Ok(ManagedStream {
            channel_id: channel_id.to_string(),
            registration_id,
            stream,
            metadata: metadata.clone(),
        })
    }
}
