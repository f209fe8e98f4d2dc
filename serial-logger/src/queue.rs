use std::{
    collections::VecDeque,
    num::NonZeroUsize,
    sync::{Arc, Mutex, MutexGuard},
};

/// Bounded FIFO of logged lines shared between the logger thread and a poller.
///
/// Lines are only accepted while queue logging is enabled. When full, the
/// oldest line is evicted. Enabling or disabling clears the queue so a poller
/// never sees lines logged before it asked for them.
#[derive(Debug, Clone)]
pub struct LineQueue {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    capacity: NonZeroUsize,
    state: Mutex<State>,
}

/// The flag lives under the same lock as the lines, so a push never lands
/// between a disable and its clear.
#[derive(Debug, Default)]
struct State {
    enabled: bool,
    lines: VecDeque<String>,
}

impl LineQueue {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Arc::new(Inner {
                capacity,
                state: Mutex::new(State {
                    enabled: false,
                    lines: VecDeque::with_capacity(capacity.get()),
                }),
            }),
        }
    }

    /// Like [`LineQueue::new`]; `None` for a zero capacity.
    pub fn with_capacity(capacity: usize) -> Option<Self> {
        NonZeroUsize::new(capacity).map(Self::new)
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // poisoning leaves the deque intact
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    pub fn start_logging(&self) {
        self.set_enabled(true);
    }

    pub fn stop_logging(&self) {
        self.set_enabled(false);
    }

    fn set_enabled(&self, enabled: bool) {
        let mut state = self.state();
        state.lines.clear();
        state.enabled = enabled;
    }

    /// Appends a line if queue logging is enabled. Returns the evicted line, if any.
    pub fn push(&self, line: impl Into<String>) -> Option<String> {
        let mut state = self.state();
        if !state.enabled {
            return None;
        }
        let evicted = if state.lines.len() >= self.inner.capacity.get() {
            state.lines.pop_front()
        } else {
            None
        };
        state.lines.push_back(line.into());
        evicted
    }

    /// Takes the oldest line.
    pub fn pop(&self) -> Option<String> {
        self.state().lines.pop_front()
    }

    /// Peeks at the most recent line without removing it.
    pub fn last(&self) -> Option<String> {
        self.state().lines.back().cloned()
    }

    pub fn len(&self) -> usize {
        self.state().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().lines.is_empty()
    }

    pub fn clear(&self) {
        self.state().lines.clear();
    }
}
