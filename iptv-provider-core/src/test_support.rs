//! Scripted backend and recording observer shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::error::{BackendError, ProviderError};
use crate::models::state::LifecycleState;
use crate::models::stream_metadata::{Acquisition, StreamMetadata};
use crate::provider::base::ProviderCore;
use crate::registry::memory::MemoryRegistry;
use crate::traits::backend_driver::BackendDriver;
use crate::traits::provider_observer::ProviderObserver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestStream {
    pub id: u32,
    pub channel: String,
}

/// What the next `begin_acquire` call does. Defaults to `Succeed`.
pub enum Step {
    Succeed,
    Fail(&'static str),
    /// Sleep, then fail.
    FailAfter(Duration, &'static str),
    /// Sleep, then succeed.
    Delay(Duration),
    /// Signal `entered`, wait for `release`, then succeed.
    Gate {
        entered: SyncSender<()>,
        release: Receiver<()>,
    },
}

#[derive(Default)]
pub struct ScriptedDriver {
    script: Mutex<VecDeque<Step>>,
    next_id: AtomicU32,
    begin_calls: AtomicUsize,
    acquired_channels: Mutex<Vec<String>>,
    ended: Mutex<Vec<TestStream>>,
    fail_release: bool,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_steps(steps: impl IntoIterator<Item = Step>) -> Self {
        let driver = Self::default();
        driver.script.lock().extend(steps);
        driver
    }

    /// `end_acquire` records the stream but reports an error.
    pub fn failing_release() -> Self {
        Self {
            fail_release: true,
            ..Self::default()
        }
    }

    pub fn begin_calls(&self) -> usize {
        self.begin_calls.load(Ordering::SeqCst)
    }

    pub fn acquired_channels(&self) -> Vec<String> {
        self.acquired_channels.lock().clone()
    }

    pub fn ended(&self) -> Vec<TestStream> {
        self.ended.lock().clone()
    }
}

impl BackendDriver for ScriptedDriver {
    type Stream = TestStream;

    fn begin_acquire(&self, channel: &str) -> Result<Acquisition<TestStream>, BackendError> {
        self.begin_calls.fetch_add(1, Ordering::SeqCst);
        self.acquired_channels.lock().push(channel.to_string());

        let step = self.script.lock().pop_front().unwrap_or(Step::Succeed);
        match step {
            Step::Succeed => {}
            Step::Fail(message) => return Err(BackendError::msg(message)),
            Step::FailAfter(delay, message) => {
                thread::sleep(delay);
                return Err(BackendError::msg(message));
            }
            Step::Delay(delay) => thread::sleep(delay),
            Step::Gate { entered, release } => {
                let _ = entered.send(());
                let _ = release.recv();
            }
        }

        let stream = TestStream {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            channel: channel.to_string(),
        };
        let metadata = StreamMetadata::new().with_content_type("video/mp2t");
        Ok(Acquisition::with_metadata(stream, metadata))
    }

    fn end_acquire(&self, stream: TestStream) -> Result<(), BackendError> {
        self.ended.lock().push(stream);
        if self.fail_release {
            return Err(BackendError::msg("release failed"));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    State(String, LifecycleState),
    Stopped(String),
    Error(String, String),
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Stopped(channel) => Some(channel),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Error(_, message) => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl ProviderObserver for RecordingObserver {
    fn on_stopped(&self, channel: &str) {
        self.events.lock().push(Event::Stopped(channel.to_string()));
    }

    fn on_state_changed(&self, channel: &str, state: LifecycleState) {
        self.events.lock().push(Event::State(channel.to_string(), state));
    }

    fn on_error(&self, channel: &str, error: &ProviderError) {
        self.events.lock().push(Event::Error(channel.to_string(), error.to_string()));
    }
}

pub type TestProvider = ProviderCore<ScriptedDriver, MemoryRegistry<TestStream>>;

pub fn provider(driver: ScriptedDriver) -> (TestProvider, Arc<MemoryRegistry<TestStream>>) {
    let registry = Arc::new(MemoryRegistry::new());
    (ProviderCore::new(driver, Arc::clone(&registry)), registry)
}
