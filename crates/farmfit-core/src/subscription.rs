// Scoped subscription handles
//
// A SubscriptionHandle owns the task draining a change feed (or following
// an identity session). Dropping the handle aborts the task, which drops
// the underlying stream and thereby releases the gateway subscription.

use std::future::Future;
use tokio::task::JoinHandle;
use tracing::debug;

/// Owned background task released on drop
#[derive(Debug)]
pub struct SubscriptionHandle {
    label: String,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Spawn `task` on the current runtime and take ownership of it
    pub fn spawn<F>(label: impl Into<String>, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let label = label.into();
        debug!(subscription = %label, "Subscription opened");
        Self {
            label,
            task: Some(tokio::spawn(task)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// True while the task is still running
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Release the subscription now
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(subscription = %self.label, "Subscription released");
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_drop_aborts_task() {
        let released = Arc::new(AtomicBool::new(false));
        let guard = SetOnDrop(released.clone());

        let handle = SubscriptionHandle::spawn("test", async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });
        tokio::task::yield_now().await;
        assert!(handle.is_active());

        drop(handle);
        for _ in 0..10 {
            if released.load(Ordering::SeqCst) {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_finished_task_is_inactive() {
        let handle = SubscriptionHandle::spawn("short", async {});
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!handle.is_active());
        assert_eq!(handle.label(), "short");
    }
}
