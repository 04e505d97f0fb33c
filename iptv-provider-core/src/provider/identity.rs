use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::models::error::ProviderError;
use crate::models::state::LifecycleState;
use crate::models::stream_metadata::Acquisition;
use crate::traits::backend_driver::BackendDriver;
use crate::traits::provider_observer::ProviderObserver;
use crate::traits::stream_registry::{StreamRegistry, TeardownCallback};

/// Internal lifecycle slot, protected by `parking_lot::Mutex`.
///
/// `stream` is present exactly when the slot is `Running`.
enum Slot<S> {
    Idle,
    Starting,
    /// The caller gave up on a timed-out acquisition but the backend call is
    /// still running on its worker. Blocks new starts until the worker is done.
    Abandoned,
    Running {
        acquisition: Uuid,
        channel: String,
        channel_id: String,
        stream: S,
    },
}

impl<S> Slot<S> {
    fn state(&self) -> LifecycleState {
        match self {
            Self::Idle => LifecycleState::Idle,
            Self::Starting | Self::Abandoned => LifecycleState::Starting,
            Self::Running { .. } => LifecycleState::Running,
        }
    }
}

/// State shared by a provider and every binding derived from it.
///
/// One identity stands for one physical backend slot: the driver, the
/// registry it publishes into, the observers, and the started/current-stream
/// slot. Providers and bindings only ever hold an `Arc` to it.
pub(crate) struct Identity<D, R>
where
    D: BackendDriver,
    R: StreamRegistry<Stream = D::Stream>,
{
    id: Uuid,
    driver: D,
    registry: Arc<R>,
    acquire_timeout: Option<Duration>,
    slot: Mutex<Slot<D::Stream>>,
    observers: RwLock<Vec<Arc<dyn ProviderObserver>>>,
}

impl<D, R> Identity<D, R>
where
    D: BackendDriver,
    R: StreamRegistry<Stream = D::Stream>,
{
    pub(crate) fn new(driver: D, registry: Arc<R>, acquire_timeout: Option<Duration>) -> Self {
        Self {
            id: Uuid::new_v4(),
            driver,
            registry,
            acquire_timeout,
            slot: Mutex::new(Slot::Idle),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn driver(&self) -> &D {
        &self.driver
    }

    pub(crate) fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    pub(crate) fn state(&self) -> LifecycleState {
        self.slot.lock().state()
    }

    pub(crate) fn current_stream(&self) -> Option<D::Stream> {
        match &*self.slot.lock() {
            Slot::Running { stream, .. } => Some(stream.clone()),
            _ => None,
        }
    }

    pub(crate) fn current_channel_id(&self) -> Option<String> {
        match &*self.slot.lock() {
            Slot::Running { channel_id, .. } => Some(channel_id.clone()),
            _ => None,
        }
    }

    pub(crate) fn add_observer(&self, observer: Arc<dyn ProviderObserver>) {
        self.observers.write().push(observer);
    }

    /// Acquire a stream for the bound `channel` and publish it under `channel_id`.
    ///
    /// The channel check, the in-use check and the move to `Starting` happen
    /// under a single lock acquisition, before the backend is called.
    pub(crate) fn start(
        self: &Arc<Self>,
        channel: Option<&str>,
        channel_id: &str,
    ) -> Result<R::Managed, ProviderError> {
        let Some(channel) = channel else {
            return Err(self.fail("", ProviderError::NoChannelSelected));
        };

        let acquisition_id = Uuid::new_v4();
        {
            let mut slot = self.slot.lock();
            if !matches!(*slot, Slot::Idle) {
                drop(slot);
                return Err(self.fail(channel, ProviderError::InUse));
            }
            *slot = Slot::Starting;
        }
        log::debug!("[{}] starting '{}' via {}", channel, channel_id, self.driver.name());
        self.notify_state(channel, LifecycleState::Starting);

        let acquired = match self.acquire(channel) {
            Ok(acquired) => acquired,
            Err(err) => {
                // An abandoned slot is reset by the acquisition worker instead.
                let reset = {
                    let mut slot = self.slot.lock();
                    let starting = matches!(*slot, Slot::Starting);
                    if starting {
                        *slot = Slot::Idle;
                    }
                    starting
                };
                if reset {
                    self.notify_state(channel, LifecycleState::Idle);
                }
                return Err(self.fail(channel, err));
            }
        };

        let Acquisition { stream, metadata } = acquired;
        *self.slot.lock() = Slot::Running {
            acquisition: acquisition_id,
            channel: channel.to_string(),
            channel_id: channel_id.to_string(),
            stream: stream.clone(),
        };
        self.notify_state(channel, LifecycleState::Running);

        let weak = Arc::downgrade(self);
        let on_teardown: TeardownCallback = Box::new(move || {
            if let Some(identity) = weak.upgrade() {
                identity.teardown(acquisition_id);
            }
        });

        match self.registry.register_channel(channel_id, stream, &metadata, on_teardown) {
            Ok(managed) => {
                log::info!("[{}] streaming as '{}'", channel, channel_id);
                Ok(managed)
            }
            Err(err) => {
                if let Some((stream, _)) = self.take_running(Some(acquisition_id)) {
                    self.release_stream(channel, stream);
                    self.notify_state(channel, LifecycleState::Idle);
                }
                Err(self.fail(channel, ProviderError::Registry(err)))
            }
        }
    }

    /// Release the running stream, whichever binding started it.
    pub(crate) fn stop(&self, caller: &str) -> Result<(), ProviderError> {
        let Some((stream, channel)) = self.take_running(None) else {
            log::error!("[{}] stop() without a running stream", caller);
            return Err(ProviderError::NotStarted);
        };
        log::info!("[{}] stopping", channel);
        self.release(&channel, stream);
        Ok(())
    }

    /// Registry-initiated stop. A no-op unless `acquisition` is still the
    /// one running, so a late callback never tears down a newer stream.
    fn teardown(&self, acquisition: Uuid) {
        match self.take_running(Some(acquisition)) {
            Some((stream, channel)) => {
                log::info!("[{}] registry requested teardown", channel);
                self.release(&channel, stream);
            }
            None => log::debug!("ignoring stale teardown for acquisition {}", acquisition),
        }
    }

    /// Move `Running` to `Idle`, optionally only for a given acquisition.
    fn take_running(&self, only: Option<Uuid>) -> Option<(D::Stream, String)> {
        let mut slot = self.slot.lock();
        match &*slot {
            Slot::Running { acquisition, .. } if only.is_none_or(|id| id == *acquisition) => {}
            _ => return None,
        }
        match std::mem::replace(&mut *slot, Slot::Idle) {
            Slot::Running { stream, channel, .. } => Some((stream, channel)),
            _ => None,
        }
    }

    fn release(&self, channel: &str, stream: D::Stream) {
        self.release_stream(channel, stream);
        self.notify_state(channel, LifecycleState::Idle);
        for observer in self.observers() {
            observer.on_stopped(channel);
        }
    }

    fn release_stream(&self, channel: &str, stream: D::Stream) {
        if let Err(e) = self.driver.end_acquire(stream) {
            log::warn!("[{}] {} failed to release stream: {}", channel, self.driver.name(), e);
        }
    }

    /// Called by the acquisition worker once an abandoned backend call returned.
    fn finish_abandoned(&self, channel: &str) {
        let reset = {
            let mut slot = self.slot.lock();
            let abandoned = matches!(*slot, Slot::Abandoned);
            if abandoned {
                *slot = Slot::Idle;
            }
            abandoned
        };
        if reset {
            log::debug!("[{}] abandoned acquisition finished", channel);
            self.notify_state(channel, LifecycleState::Idle);
        }
    }

    /// Run the backend acquisition, bounded by the configured timeout.
    ///
    /// With a timeout the backend runs on a worker thread. The hand-off is a
    /// rendezvous channel: once the caller gave up, `send` fails and the
    /// worker releases the late stream itself. The slot stays `Abandoned`
    /// until then, so only one backend call is ever in flight.
    fn acquire(self: &Arc<Self>, channel: &str) -> Result<Acquisition<D::Stream>, ProviderError> {
        let Some(timeout) = self.acquire_timeout else {
            return self.driver.begin_acquire(channel).map_err(ProviderError::from);
        };

        let (tx, rx) = mpsc::sync_channel(0);
        let identity = Arc::clone(self);
        let worker_channel = channel.to_string();

        thread::Builder::new()
            .name(format!("acquire-{}", channel))
            .spawn(move || {
                let result = identity.driver.begin_acquire(&worker_channel);
                if let Err(mpsc::SendError(late)) = tx.send(result) {
                    if let Ok(late) = late {
                        log::warn!("[{}] releasing stream acquired after the deadline", worker_channel);
                        identity.release_stream(&worker_channel, late.stream);
                    }
                    identity.finish_abandoned(&worker_channel);
                }
            })
            .map_err(|e| ProviderError::Internal(format!("failed to spawn acquisition thread: {}", e)))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result.map_err(ProviderError::from),
            Err(RecvTimeoutError::Timeout) => {
                // Must happen before `rx` drops, which is what fails the worker's send.
                *self.slot.lock() = Slot::Abandoned;
                Err(ProviderError::Timeout {
                    secs: timeout.as_secs_f64(),
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(ProviderError::Internal(
                "acquisition thread exited without a result".into(),
            )),
        }
    }

    fn fail(&self, channel: &str, error: ProviderError) -> ProviderError {
        log::debug!("[{}] start failed: {}", channel, error);
        for observer in self.observers() {
            observer.on_error(channel, &error);
        }
        error
    }

    fn notify_state(&self, channel: &str, state: LifecycleState) {
        for observer in self.observers() {
            observer.on_state_changed(channel, state);
        }
    }

    // Snapshot so observers can register further observers without deadlocking.
    fn observers(&self) -> Vec<Arc<dyn ProviderObserver>> {
        self.observers.read().clone()
    }
}

impl<D, R> Drop for Identity<D, R>
where
    D: BackendDriver,
    R: StreamRegistry<Stream = D::Stream>,
{
    fn drop(&mut self) {
        if let Slot::Running { channel, stream, .. } = std::mem::replace(self.slot.get_mut(), Slot::Idle) {
            log::debug!("[{}] releasing stream of dropped provider", channel);
            if let Err(e) = self.driver.end_acquire(stream) {
                log::warn!("[{}] failed to release stream: {}", channel, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::models::config::ProviderOptions;
    use crate::provider::base::ProviderCore;
    use crate::registry::memory::MemoryRegistry;
    use crate::test_support::{provider, Event, RecordingObserver, ScriptedDriver, Step, TestStream};
    use crate::traits::stream_provider::StreamProvider;

    fn wait_until(what: &str, condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn start_while_acquiring_is_in_use() {
        let (entered_tx, entered_rx) = mpsc::sync_channel(1);
        let (release_tx, release_rx) = mpsc::channel();
        let driver = ScriptedDriver::with_steps([Step::Gate {
            entered: entered_tx,
            release: release_rx,
        }]);
        let (provider, _registry) = provider(driver);
        let a = provider.bind_to_channel("a");
        let b = provider.bind_to_channel("b");

        let worker = {
            let a = a.clone();
            thread::spawn(move || a.start("a").map(|managed| managed.channel_id))
        };
        entered_rx.recv().unwrap();

        assert_eq!(b.state(), LifecycleState::Starting);
        assert!(matches!(b.start("b"), Err(ProviderError::InUse)));
        assert!(matches!(b.stop(), Err(ProviderError::NotStarted)));
        assert_eq!(b.current_stream(), None);

        release_tx.send(()).unwrap();
        assert_eq!(worker.join().unwrap().unwrap(), "a");
        assert_eq!(provider.driver().begin_calls(), 1);
        assert_eq!(a.state(), LifecycleState::Running);
    }

    #[test]
    fn concurrent_starts_admit_exactly_one() {
        let (provider, _registry) = provider(ScriptedDriver::with_steps([Step::Delay(Duration::from_millis(50))]));
        let bindings: Vec<_> = (0..8).map(|i| provider.bind_to_channel(&format!("ch{}", i))).collect();

        let handles: Vec<_> = bindings
            .into_iter()
            .map(|binding| thread::spawn(move || binding.start(&binding.describe()).is_ok()))
            .collect();
        let started = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();

        assert_eq!(started, 1);
        assert_eq!(provider.driver().begin_calls(), 1);
    }

    #[test]
    fn registry_teardown_stops_provider() {
        let (provider, registry) = provider(ScriptedDriver::new());
        let observer = RecordingObserver::new();
        provider.add_observer(observer.clone());
        let news = provider.bind_to_channel("news1");
        news.start("news1").unwrap();

        assert!(registry.request_teardown("news1"));

        assert_eq!(news.state(), LifecycleState::Idle);
        assert_eq!(provider.driver().ended().len(), 1);
        assert_eq!(observer.stopped(), vec!["news1".to_string()]);
        assert!(matches!(news.stop(), Err(ProviderError::NotStarted)));
    }

    #[test]
    fn stale_teardown_is_ignored() {
        let (provider, registry) = provider(ScriptedDriver::new());
        let news = provider.bind_to_channel("news1");
        news.start("first").unwrap();
        news.stop().unwrap();
        news.start("second").unwrap();

        assert!(registry.request_teardown("first"));

        assert_eq!(news.state(), LifecycleState::Running);
        assert_eq!(news.current_channel_id().as_deref(), Some("second"));
        assert_eq!(provider.driver().ended().len(), 1);
    }

    #[test]
    fn teardown_after_provider_dropped_is_a_no_op() {
        let registry = Arc::new(MemoryRegistry::<TestStream>::new());
        {
            let news = ProviderCore::new(ScriptedDriver::new(), Arc::clone(&registry)).bind_to_channel("news1");
            news.start("news1").unwrap();
        }

        assert!(registry.request_teardown("news1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn acquisition_timeout_resets_and_releases_late_stream() {
        let registry = Arc::new(MemoryRegistry::<TestStream>::new());
        let options = ProviderOptions {
            channel: Some("slow".into()),
            acquire_timeout_secs: Some(0.05),
        };
        let driver = ScriptedDriver::with_steps([Step::Delay(Duration::from_millis(300))]);
        let provider = ProviderCore::with_options(driver, Arc::clone(&registry), options).unwrap();

        let observer = RecordingObserver::new();
        provider.add_observer(observer.clone());

        let err = provider.start("slow").unwrap_err();

        assert!(matches!(err, ProviderError::Timeout { .. }));
        assert!(registry.is_empty());
        wait_until("late stream release", || provider.driver().ended().len() == 1);
        wait_until("idle after late release", || provider.state() == LifecycleState::Idle);
        assert_eq!(observer.events().last(), Some(&Event::State("slow".into(), LifecycleState::Idle)));

        provider.start("slow").unwrap();
        assert_eq!(provider.current_stream().map(|s| s.id), Some(2));
    }

    #[test]
    fn timed_out_acquisition_blocks_restart_until_backend_returns() {
        let registry = Arc::new(MemoryRegistry::<TestStream>::new());
        let options = ProviderOptions {
            channel: Some("slow".into()),
            acquire_timeout_secs: Some(0.05),
        };
        let driver = ScriptedDriver::with_steps([Step::Delay(Duration::from_millis(500))]);
        let provider = ProviderCore::with_options(driver, Arc::clone(&registry), options).unwrap();
        let sibling = provider.bind_to_channel("other");

        assert!(matches!(provider.start("slow"), Err(ProviderError::Timeout { .. })));

        assert_eq!(provider.state(), LifecycleState::Starting);
        assert!(matches!(provider.start("slow"), Err(ProviderError::InUse)));
        assert!(matches!(sibling.start("other"), Err(ProviderError::InUse)));
        assert!(matches!(provider.stop(), Err(ProviderError::NotStarted)));
        assert_eq!(provider.driver().begin_calls(), 1);

        wait_until("abandoned acquisition to finish", || provider.state() == LifecycleState::Idle);
        assert_eq!(provider.driver().ended().len(), 1);
        sibling.start("other").unwrap();
        assert_eq!(provider.driver().begin_calls(), 2);
    }

    #[test]
    fn timed_out_backend_failure_unblocks_identity() {
        let registry = Arc::new(MemoryRegistry::<TestStream>::new());
        let options = ProviderOptions {
            channel: Some("slow".into()),
            acquire_timeout_secs: Some(0.05),
        };
        let driver = ScriptedDriver::with_steps([Step::FailAfter(Duration::from_millis(300), "upstream 503")]);
        let provider = ProviderCore::with_options(driver, registry, options).unwrap();

        assert!(matches!(provider.start("slow"), Err(ProviderError::Timeout { .. })));
        assert!(provider.is_started());
        assert!(matches!(provider.start("slow"), Err(ProviderError::InUse)));

        wait_until("abandoned acquisition to finish", || provider.state() == LifecycleState::Idle);
        assert!(provider.driver().ended().is_empty());
        provider.start("slow").unwrap();
    }

    #[test]
    fn acquisition_within_timeout_succeeds() {
        let registry = Arc::new(MemoryRegistry::<TestStream>::new());
        let options = ProviderOptions {
            channel: Some("fast".into()),
            acquire_timeout_secs: Some(5.0),
        };
        let provider = ProviderCore::with_options(ScriptedDriver::new(), Arc::clone(&registry), options).unwrap();

        let managed = provider.start("fast").unwrap();

        assert_eq!(managed.stream.channel, "fast");
        assert!(provider.driver().ended().is_empty());
    }

    #[test]
    fn backend_failure_under_timeout_is_forwarded() {
        let registry = Arc::new(MemoryRegistry::<TestStream>::new());
        let options = ProviderOptions {
            channel: Some("news1".into()),
            acquire_timeout_secs: Some(5.0),
        };
        let driver = ScriptedDriver::with_steps([Step::Fail("404 from upstream")]);
        let provider = ProviderCore::with_options(driver, registry, options).unwrap();

        let err = provider.start("news1").unwrap_err();

        assert_eq!(err.to_string(), "404 from upstream");
        assert!(!provider.is_started());
    }
}
