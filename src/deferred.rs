//! Single-assignment completion slot shared by a waiting borrower and
//! whichever party settles its request first.

use tokio::sync::oneshot;

/// Create a connected writer/reader pair
pub(crate) fn deferred<T>() -> (Deferred<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (Deferred { tx }, Completion { rx })
}

/// Write half. Consumed on settle, so a request is settled at most once.
#[derive(Debug)]
pub(crate) struct Deferred<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Deferred<T> {
    /// Settle the slot. Hands the value back if the reader has gone away.
    pub fn settle(self, value: T) -> Result<(), T> {
        self.tx.send(value)
    }

    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Read half, awaited by the borrower
#[derive(Debug)]
pub(crate) struct Completion<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Completion<T> {
    /// Wait for the value. `None` means the writer was dropped unsettled.
    pub async fn wait(&mut self) -> Option<T> {
        (&mut self.rx).await.ok()
    }

    /// Take the value if it has already been written
    pub fn try_take(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}
