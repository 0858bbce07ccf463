//! Task plumbing shared by the protocol tasks.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Aborts the wrapped task when dropped.
pub struct AbortOnDrop(Option<JoinHandle<()>>);

impl AbortOnDrop {
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self(Some(tokio::spawn(future)))
    }

    pub fn is_finished(&self) -> bool {
        self.0.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Aborts the task and waits until it has stopped.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

/// Sends `event` to `sender` after `delay`, unless the guard is dropped first.
pub fn spawn_timer<E>(sender: mpsc::Sender<E>, delay: Duration, event: E) -> AbortOnDrop
where
    E: Send + 'static,
{
    AbortOnDrop::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = sender.send(event).await;
    })
}
