//! Status sources: interchangeable producers of [`StatusUpdate`]s.
//!
//! Every source is driven the same way: `start` hands it an [`UpdateSink`]
//! and spawns its background work; `stop` cancels that work and closes the
//! sink. Once `stop` returns the sink will not be invoked again.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use docflow_core::StatusUpdate;

mod poll;
mod scripted;
mod stream;

pub use poll::{JobFetcher, PollState, PollingSource, StatusFetcher, WorkflowFetcher};
pub use scripted::{ReplayState, ScriptedSource};
pub use stream::{StreamSource, StreamState};

type UpdateFn = Box<dyn FnMut(StatusUpdate) + Send>;

/// The `onUpdate` callback shared between a source and its background task.
///
/// Delivery happens under a lock, so [`close`](Self::close) waits for an
/// in-flight delivery and every later delivery is refused.
#[derive(Clone)]
pub struct UpdateSink {
    inner: Arc<Mutex<Option<UpdateFn>>>,
}

impl UpdateSink {
    /// Wrap a callback.
    pub fn new(callback: impl FnMut(StatusUpdate) + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(Box::new(callback)))),
        }
    }

    /// Forward updates into a channel drained by a single consumer.
    pub fn channel(tx: mpsc::UnboundedSender<StatusUpdate>) -> Self {
        Self::new(move |update| {
            let _ = tx.send(update);
        })
    }

    /// Invoke the callback. Returns `false` if the sink has been closed.
    pub fn deliver(&self, update: StatusUpdate) -> bool {
        match self.lock().as_mut() {
            Some(callback) => {
                callback(update);
                true
            }
            None => false,
        }
    }

    /// Drop the callback; later deliveries are refused.
    pub fn close(&self) {
        self.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> MutexGuard<'_, Option<UpdateFn>> {
        // A panicking callback must not wedge stop().
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for UpdateSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateSink")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Common lifecycle of all sources.
pub trait StatusSource: Send {
    /// Begin delivering updates to `sink`. Starting a running source is a no-op.
    fn start(&mut self, sink: UpdateSink);

    /// Stop delivering. No sink invocation happens after this returns.
    fn stop(&mut self);

    /// Short description for logs.
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_core::{JobId, JobStatus};

    #[test]
    fn test_closed_sink_refuses_delivery() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = UpdateSink::channel(tx);

        assert!(sink.deliver(JobStatus::new(JobId::new("job_1")).into()));
        sink.clone().close();
        assert!(sink.is_closed());
        assert!(!sink.deliver(JobStatus::new(JobId::new("job_2")).into()));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
