// Cooperative shutdown signal shared by the long-running loops
//
// A `ShutdownHandle` flips a watch channel once; every `Shutdown` clone observes it at its
// next suspension point. Dropping the handle without calling `shutdown` never cancels.

use tokio::sync::watch;

/// Sending side. Calling [`ShutdownHandle::shutdown`] more than once is harmless.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

/// Receiving side, cheap to clone into tasks.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Create a connected handle/signal pair.
pub fn channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, Shutdown { rx })
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

impl Shutdown {
    /// A signal that never fires. Useful for one-shot calls made outside any service loop.
    pub fn never() -> Self {
        channel().1
    }

    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been requested.
    pub async fn recv(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Handle dropped without a shutdown: nothing will ever fire.
                std::future::pending::<()>().await;
            }
        }
    }
}
