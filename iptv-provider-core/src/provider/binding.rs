use std::fmt;
use std::sync::Arc;

use crate::models::error::ProviderError;
use crate::models::state::LifecycleState;
use crate::provider::identity::Identity;
use crate::traits::backend_driver::BackendDriver;
use crate::traits::provider_observer::ProviderObserver;
use crate::traits::stream_provider::StreamProvider;
use crate::traits::stream_registry::StreamRegistry;

/// A provider specialised to one channel name.
///
/// Shares the originating provider's identity rather than copying it, so all
/// bindings of one provider are mutually exclusive: one physical backend
/// exposed as N channels, only one of which can stream at a time.
pub struct ChannelBinding<D, R>
where
    D: BackendDriver,
    R: StreamRegistry<Stream = D::Stream>,
{
    identity: Arc<Identity<D, R>>,
    channel: String,
}

impl<D, R> ChannelBinding<D, R>
where
    D: BackendDriver,
    R: StreamRegistry<Stream = D::Stream>,
{
    pub(crate) fn new(identity: Arc<Identity<D, R>>, channel: &str) -> Self {
        Self {
            identity,
            channel: channel.to_string(),
        }
    }

    pub(crate) fn belongs_to(&self, identity: &Arc<Identity<D, R>>) -> bool {
        Arc::ptr_eq(&self.identity, identity)
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn driver(&self) -> &D {
        self.identity.driver()
    }

    pub fn is_started(&self) -> bool {
        self.identity.state().is_started()
    }

    pub fn current_stream(&self) -> Option<D::Stream> {
        self.identity.current_stream()
    }

    pub fn current_channel_id(&self) -> Option<String> {
        self.identity.current_channel_id()
    }

    pub fn add_observer(&self, observer: Arc<dyn ProviderObserver>) {
        self.identity.add_observer(observer);
    }

    pub fn shares_identity_with(&self, other: &ChannelBinding<D, R>) -> bool {
        other.belongs_to(&self.identity)
    }

    #[deprecated(note = "use `bind_to_channel`")]
    pub fn chan(&self, channel: &str) -> ChannelBinding<D, R> {
        super::warn_chan_deprecated();
        self.bind_to_channel(channel)
    }
}

impl<D, R> StreamProvider for ChannelBinding<D, R>
where
    D: BackendDriver,
    R: StreamRegistry<Stream = D::Stream>,
{
    type Managed = R::Managed;
    type Binding = ChannelBinding<D, R>;

    fn start(&self, channel_id: &str) -> Result<R::Managed, ProviderError> {
        self.identity.start(Some(self.channel.as_str()), channel_id)
    }

    fn stop(&self) -> Result<(), ProviderError> {
        self.identity.stop(&self.channel)
    }

    /// Sibling binding on the same identity.
    fn bind_to_channel(&self, channel: &str) -> ChannelBinding<D, R> {
        Self::new(Arc::clone(&self.identity), channel)
    }

    fn describe(&self) -> String {
        self.channel.clone()
    }

    fn state(&self) -> LifecycleState {
        self.identity.state()
    }
}

impl<D, R> Clone for ChannelBinding<D, R>
where
    D: BackendDriver,
    R: StreamRegistry<Stream = D::Stream>,
{
    fn clone(&self) -> Self {
        Self {
            identity: Arc::clone(&self.identity),
            channel: self.channel.clone(),
        }
    }
}

impl<D, R> fmt::Display for ChannelBinding<D, R>
where
    D: BackendDriver,
    R: StreamRegistry<Stream = D::Stream>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.channel)
    }
}

impl<D, R> fmt::Debug for ChannelBinding<D, R>
where
    D: BackendDriver,
    R: StreamRegistry<Stream = D::Stream>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelBinding")
            .field("identity", &self.identity.id())
            .field("channel", &self.channel)
            .field("state", &self.identity.state())
            .finish()
    }
}
