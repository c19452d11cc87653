//! Status reporting and cooperative cancellation.
//!
//! Long loops call [`Progress::check`] at fixed intervals; once the shared
//! [`CancellationToken`] is raised the check returns [`Error::Cancelled`], which every layer
//! propagates unchanged.

use crate::error::{Error, Result};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Receiver of human-readable progress information.
///
/// Implementations must be cheap; they are called from worker threads.
pub trait ProgressSink: Send + Sync {
    fn status(&self, _message: &str) {}

    /// Determinate progress, `current` out of `total`.
    fn progress(&self, _current: usize, _total: usize) {}

    fn indeterminate(&self) {}
}

/// Shared flag that requests cancellation of a running computation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Progress handle threaded through every matching routine.
#[derive(Clone, Default)]
pub struct Progress {
    sink: Option<Arc<dyn ProgressSink>>,
    token: CancellationToken,
}

impl Progress {
    /// Reports nothing and is never cancelled unless its token is.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink: Some(sink),
            token: CancellationToken::new(),
        }
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Publishes a status line to the sink and to the log.
    pub fn status(&self, message: &str) {
        tracing::info!("{message}");
        if let Some(sink) = &self.sink {
            sink.status(message);
        }
    }

    pub fn update(&self, current: usize, total: usize) {
        if let Some(sink) = &self.sink {
            sink.progress(current, total);
        }
    }

    pub fn indeterminate(&self) {
        if let Some(sink) = &self.sink {
            sink.indeterminate();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Fails with [`Error::Cancelled`] once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("has_sink", &self.sink.is_some())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        lines: Mutex<Vec<String>>,
        last: Mutex<Option<(usize, usize)>>,
    }

    impl ProgressSink for Recorder {
        fn status(&self, message: &str) {
            self.lines.lock().unwrap().push(message.to_string());
        }

        fn progress(&self, current: usize, total: usize) {
            *self.last.lock().unwrap() = Some((current, total));
        }
    }

    #[test]
    fn check_fails_after_cancel() {
        let progress = Progress::silent();
        assert!(progress.check().is_ok());

        progress.token().cancel();
        assert!(progress.is_cancelled());
        assert!(progress.check().unwrap_err().is_cancelled());
    }

    #[test]
    fn clones_share_the_token() {
        let token = CancellationToken::new();
        let progress = Progress::silent().with_token(token.clone());
        let copy = progress.clone();

        token.cancel();
        assert!(copy.check().is_err());
    }

    #[test]
    fn sink_receives_status_and_progress() {
        let recorder = Arc::new(Recorder::default());
        let progress = Progress::new(recorder.clone());

        progress.status("matching");
        progress.update(3, 10);
        progress.indeterminate();

        assert_eq!(recorder.lines.lock().unwrap().as_slice(), &["matching"]);
        assert_eq!(*recorder.last.lock().unwrap(), Some((3, 10)));
    }
}
