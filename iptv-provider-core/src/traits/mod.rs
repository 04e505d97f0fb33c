pub mod backend_driver;
pub mod provider_observer;
pub mod stream_provider;
pub mod stream_registry;
