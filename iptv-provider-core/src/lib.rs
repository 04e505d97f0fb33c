//! # iptv-provider-core
//!
//! Backend-agnostic lifecycle for IPTV stream providers.
//!
//! A provider wraps one backend (HTTP relay, raw URL, VLC transcode, stream
//! daemon) that implements the two-call `BackendDriver` trait, guarantees a
//! single acquisition per backend slot, and publishes acquired streams into a
//! `StreamRegistry` that fans them out to consumers.
//!
//! ## Architecture
//!
//! ```text
//! iptv-provider-core (this crate)
//! ├── traits/    ← BackendDriver, StreamRegistry, ProviderObserver, StreamProvider
//! ├── models/    ← ProviderError, LifecycleState, ProviderOptions, StreamMetadata
//! ├── provider/  ← ProviderCore, ChannelBinding (shared lifecycle identity)
//! └── registry/  ← MemoryRegistry (in-process StreamRegistry)
//! ```
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use iptv_provider_core::{MemoryRegistry, ProviderCore, StreamProvider};
//!
//! let registry = Arc::new(MemoryRegistry::new());
//! let vlc = ProviderCore::new(VlcDriver::connect("localhost:4212")?, registry);
//! let news = vlc.bind_to_channel("News 24");
//! let sport = vlc.bind_to_channel("Sport 1");
//!
//! let managed = news.start("news24")?;
//! assert!(sport.start("sport1").is_err()); // same VLC instance: InUse
//! ```

pub mod models;
pub mod provider;
pub mod registry;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types at crate root for convenience.
pub use models::config::ProviderOptions;
pub use models::error::{BackendError, ProviderError, RegistryError};
pub use models::state::LifecycleState;
pub use models::stream_metadata::{Acquisition, StreamMetadata};
pub use provider::base::ProviderCore;
pub use provider::binding::ChannelBinding;
pub use registry::memory::{ManagedStream, MemoryRegistry};
pub use traits::backend_driver::BackendDriver;
pub use traits::provider_observer::ProviderObserver;
pub use traits::stream_provider::StreamProvider;
pub use traits::stream_registry::{StreamRegistry, TeardownCallback};
