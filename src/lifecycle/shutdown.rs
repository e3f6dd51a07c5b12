//! Shutdown coordination between the signal handler and the HTTP server.
//!
//! `main` hands one receiver to `HttpServer::run`; the signal task (or a test)
//! calls `trigger`, and the server drains in-flight requests, each of which
//! still appends its log record, before `run` returns.

use tokio::sync::broadcast;

/// One-shot stop signal fanned out to every subscriber.
///
/// Triggering with no subscribers is a no-op; late subscribers miss the signal.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver for `HttpServer::run` or any other task that must stop with it.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Ask every subscriber to stop.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Subscribers that have not yet dropped their receiver.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
