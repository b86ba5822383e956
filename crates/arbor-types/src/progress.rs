//! Cooperative progress reporting and cancellation.
//!
//! Long-running operations call [`ProgressMonitor::is_cancelled`] at each
//! checkpoint (one per element visited, one per difference merged) and stop
//! cleanly when it returns `true`. No thread or async machinery is involved.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Tracker passed to `compute()` and `merge()`.
pub trait ProgressMonitor: Send + Sync {
    /// Announce a task. `total` is the number of work units, if known.
    fn begin_task(&self, name: &str, total: Option<usize>);

    /// Record `units` of completed work.
    fn worked(&self, units: usize);

    /// Whether the caller asked the operation to stop.
    fn is_cancelled(&self) -> bool;

    /// The current task is finished.
    fn done(&self);
}

/// A monitor that reports nothing and never cancels.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProgress;

impl ProgressMonitor for NullProgress {
    fn begin_task(&self, _name: &str, _total: Option<usize>) {}

    fn worked(&self, _units: usize) {}

    fn is_cancelled(&self) -> bool {
        false
    }

    fn done(&self) {}
}

/// Shared cancellation flag.
///
/// Clones observe the same flag, so one handle can be kept by the caller
/// while another is passed into the operation.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl ProgressMonitor for CancellationToken {
    fn begin_task(&self, _name: &str, _total: Option<usize>) {}

    fn worked(&self, _units: usize) {}

    fn is_cancelled(&self) -> bool {
        CancellationToken::is_cancelled(self)
    }

    fn done(&self) {}
}

/// Snapshot of the progress of the current task.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    pub task: String,
    pub total: Option<usize>,
    pub completed: usize,
    pub finished: bool,
}

impl Progress {
    /// Completion percentage (0-100), or `None` if the total is unknown.
    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(100.0),
            Some(total) => Some((self.completed as f64 / total as f64 * 100.0).min(100.0)),
            None => None,
        }
    }
}

/// Progress callback type.
pub type ProgressCallback = Arc<dyn Fn(&Progress) + Send + Sync>;

/// A monitor that records progress, forwards it to an optional callback,
/// and honours a [`CancellationToken`].
pub struct ProgressTracker {
    current: Mutex<Progress>,
    completed: AtomicUsize,
    token: CancellationToken,
    callback: Option<ProgressCallback>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Progress::default()),
            completed: AtomicUsize::new(0),
            token: CancellationToken::new(),
            callback: None,
        }
    }

    /// Share an existing cancellation token.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Invoke `callback` whenever progress changes.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// The token controlling this tracker.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Current progress snapshot.
    pub fn snapshot(&self) -> Progress {
        let mut progress = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        progress.completed = self.completed.load(Ordering::Relaxed);
        progress
    }

    fn update(&self, f: impl FnOnce(&mut Progress)) {
        let snapshot = {
            let mut current = self
                .current
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            f(&mut current);
            current.completed = self.completed.load(Ordering::Relaxed);
            current.clone()
        };
        if let Some(callback) = &self.callback {
            callback(&snapshot);
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("progress", &self.snapshot())
            .field("cancelled", &self.token.is_cancelled())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

impl ProgressMonitor for ProgressTracker {
    fn begin_task(&self, name: &str, total: Option<usize>) {
        self.completed.store(0, Ordering::Relaxed);
        self.update(|p| {
            p.task = name.to_string();
            p.total = total;
            p.finished = false;
        });
    }

    fn worked(&self, units: usize) {
        self.completed.fetch_add(units, Ordering::Relaxed);
        self.update(|_| {});
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    fn done(&self) {
        self.update(|p| p.finished = true);
    }
}
