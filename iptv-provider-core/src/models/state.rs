use std::fmt;

/// Lifecycle of a shared provider identity.
///
/// State transitions:
/// ```text
/// idle → starting → running
///   ↑        │          │
///   └────────┴──────────┘   (backend failure / timeout, stop)
/// ```
///
/// `Starting` only exists while the backend is acquiring. It already counts
/// as started, so a second `start` issued in that window fails with `InUse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Idle,
    Starting,
    Running,
}

impl LifecycleState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether the started flag is set (acquiring or serving).
    pub fn is_started(&self) -> bool {
        !self.is_idle()
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Running => "running",
        };
        f.write_str(name)
    }
}
