// Redraw signalling between page loads and the viewer
//
// Loads never touch shared flags. Each load owns a guard that posts an event
// when it ends, and a single observer task turns events into a generation
// counter that viewers watch.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Event posted by page loads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A page finished loading (successfully or not)
    Redraw(usize),
    /// The result store failed while loading a page
    StoreFailure { page: usize, message: String },
}

/// Cloneable sender side; safe to use from any number of tasks
#[derive(Clone)]
pub struct RedrawHandle {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl RedrawHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn request(&self, page: usize) {
        // Receiver gone means nobody is drawing anymore
        let _ = self.tx.send(PipelineEvent::Redraw(page));
    }

    pub fn report_store_failure(&self, page: usize, message: String) {
        let _ = self.tx.send(PipelineEvent::StoreFailure { page, message });
    }

    /// Guard that requests a redraw for `page` when dropped
    pub fn guard(&self, page: usize) -> RedrawGuard<'_> {
        RedrawGuard { handle: self, page }
    }
}

/// Requests a redraw on drop, so every exit path of a load signals exactly once
pub struct RedrawGuard<'a> {
    handle: &'a RedrawHandle,
    page: usize,
}

impl Drop for RedrawGuard<'_> {
    fn drop(&mut self) {
        self.handle.request(self.page);
    }
}

/// Single consumer of pipeline events
pub struct RedrawObserver {
    generation: watch::Receiver<u64>,
    task: JoinHandle<Option<String>>,
}

impl RedrawObserver {
    /// Spawn the observer task. It bumps the generation on every redraw and
    /// stops at the first store failure, returning its message.
    pub fn spawn(mut rx: mpsc::UnboundedReceiver<PipelineEvent>) -> Self {
        let (generation_tx, generation) = watch::channel(0u64);

        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    PipelineEvent::Redraw(page) => {
                        generation_tx.send_modify(|g| *g += 1);
                        debug!("Redraw requested by page {}", page);
                    }
                    PipelineEvent::StoreFailure { page, message } => {
                        error!("Result store failed while loading page {}: {}", page, message);
                        return Some(message);
                    }
                }
            }
            None
        });

        Self { generation, task }
    }

    /// Receiver for the redraw generation counter
    pub fn generation(&self) -> watch::Receiver<u64> {
        self.generation.clone()
    }

    /// Wait until the observer stops; `Some` carries a fatal store failure.
    pub async fn finished(self) -> Option<String> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Some(format!("redraw observer failed: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_requests_redraw_on_drop() {
        let (handle, mut rx) = RedrawHandle::channel();
        {
            let _guard = handle.guard(3);
            assert!(rx.try_recv().is_err());
        }
        assert_eq!(rx.recv().await, Some(PipelineEvent::Redraw(3)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_guard_fires_on_early_return() {
        fn fails_early(handle: &RedrawHandle) -> Result<(), &'static str> {
            let _guard = handle.guard(1);
            Err::<(), _>("boom")?;
            Ok(())
        }

        let (handle, mut rx) = RedrawHandle::channel();
        assert!(fails_early(&handle).is_err());
        assert_eq!(rx.recv().await, Some(PipelineEvent::Redraw(1)));
    }

    #[tokio::test]
    async fn test_observer_counts_redraws() {
        let (handle, rx) = RedrawHandle::channel();
        let observer = RedrawObserver::spawn(rx);
        let mut generation = observer.generation();

        let senders: Vec<_> = (0..4)
            .map(|page| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.request(page) })
            })
            .collect();
        for sender in senders {
            sender.await.unwrap();
        }

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while *generation.borrow_and_update() < 4 {
                generation.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_observer_stops_on_store_failure() {
        let (handle, rx) = RedrawHandle::channel();
        let observer = RedrawObserver::spawn(rx);

        handle.request(0);
        handle.report_store_failure(2, "corrupt".to_string());

        assert_eq!(observer.finished().await, Some("corrupt".to_string()));
    }
}
