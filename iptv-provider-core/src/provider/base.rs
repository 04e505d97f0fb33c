use std::fmt;
use std::sync::Arc;

use crate::models::config::ProviderOptions;
use crate::models::error::ProviderError;
use crate::models::state::LifecycleState;
use crate::provider::binding::ChannelBinding;
use crate::provider::identity::Identity;
use crate::traits::backend_driver::BackendDriver;
use crate::traits::provider_observer::ProviderObserver;
use crate::traits::stream_provider::StreamProvider;
use crate::traits::stream_registry::StreamRegistry;

/// Lifecycle manager around one backend driver.
///
/// Owns the shared identity (started flag + current stream) of a single
/// backend slot. At most one acquisition is in flight per identity: a second
/// `start`, through this provider or any of its bindings, fails with `InUse`
/// until the running stream is stopped.
///
/// ```text
/// start ─→ [channel bound?] ─→ [idle?] ─→ starting ─→ driver.begin_acquire
///                                                        │ ok        │ err
///                                                        ↓           ↓
///                     registry.register_channel ←─ running        idle
///                        (teardown → stop)
/// ```
pub struct ProviderCore<D, R>
where
    D: BackendDriver,
    R: StreamRegistry<Stream = D::Stream>,
{
    identity: Arc<Identity<D, R>>,
    channel: Option<String>,
}

impl<D, R> ProviderCore<D, R>
where
    D: BackendDriver,
    R: StreamRegistry<Stream = D::Stream>,
{
    /// Create an unbound provider with no acquisition timeout.
    pub fn new(driver: D, registry: Arc<R>) -> Self {
        Self {
            identity: Arc::new(Identity::new(driver, registry, None)),
            channel: None,
        }
    }

    pub fn with_options(
        driver: D,
        registry: Arc<R>,
        options: ProviderOptions,
    ) -> Result<Self, ProviderError> {
        options.validate()?;
        Ok(Self {
            identity: Arc::new(Identity::new(driver, registry, options.acquire_timeout())),
            channel: options.channel,
        })
    }

    pub fn driver(&self) -> &D {
        self.identity.driver()
    }

    pub fn registry(&self) -> &Arc<R> {
        self.identity.registry()
    }

    /// Bound channel name, if any.
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn is_started(&self) -> bool {
        self.identity.state().is_started()
    }

    /// Clone of the running stream handle.
    pub fn current_stream(&self) -> Option<D::Stream> {
        self.identity.current_stream()
    }

    /// Registry channel id the running stream was published under.
    pub fn current_channel_id(&self) -> Option<String> {
        self.identity.current_channel_id()
    }

    /// Attach an observer to the shared identity (visible to all bindings).
    pub fn add_observer(&self, observer: Arc<dyn ProviderObserver>) {
        self.identity.add_observer(observer);
    }

    pub fn shares_identity_with(&self, binding: &ChannelBinding<D, R>) -> bool {
        binding.belongs_to(&self.identity)
    }

    #[deprecated(note = "use `bind_to_channel`")]
    pub fn chan(&self, channel: &str) -> ChannelBinding<D, R> {
        super::warn_chan_deprecated();
        self.bind_to_channel(channel)
    }
}

impl<D, R> StreamProvider for ProviderCore<D, R>
where
    D: BackendDriver,
    R: StreamRegistry<Stream = D::Stream>,
{
    type Managed = R::Managed;
    type Binding = ChannelBinding<D, R>;

    fn start(&self, channel_id: &str) -> Result<R::Managed, ProviderError> {
        self.identity.start(self.channel.as_deref(), channel_id)
    }

    fn stop(&self) -> Result<(), ProviderError> {
        self.identity.stop(self.channel.as_deref().unwrap_or_default())
    }

    fn bind_to_channel(&self, channel: &str) -> ChannelBinding<D, R> {
        ChannelBinding::new(Arc::clone(&self.identity), channel)
    }

    fn describe(&self) -> String {
        self.channel.clone().unwrap_or_default()
    }

    fn state(&self) -> LifecycleState {
        self.identity.state()
    }
}

impl<D, R> fmt::Display for ProviderCore<D, R>
where
    D: BackendDriver,
    R: StreamRegistry<Stream = D::Stream>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.channel.as_deref().unwrap_or_default())
    }
}

impl<D, R> fmt::Debug for ProviderCore<D, R>
where
    D: BackendDriver,
    R: StreamRegistry<Stream = D::Stream>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCore")
            .field("identity", &self.identity.id())
            .field("backend", &self.identity.driver().name())
            .field("channel", &self.channel)
            .field("state", &self.identity.state())
            .finish()
    }
}
