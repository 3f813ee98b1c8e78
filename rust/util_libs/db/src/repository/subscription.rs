use tokio::task::JoinHandle;

/// Handle to a live listener running as a background task.
///
/// Dropping the handle detaches the listener, which then keeps running until
/// its change stream ends. Call [`Subscription::unsubscribe`] to stop it.
#[must_use = "dropping a Subscription detaches its listener; call unsubscribe() to stop it"]
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    /// Stops the listener. No callback runs after the task is aborted.
    pub fn unsubscribe(self) {
        self.handle.abort();
    }

    /// Whether the listener is still running.
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}
