//! I/O workers
//!
//! Each worker is one tokio task performing blocking-style transport I/O:
//! waiting for an inbound peer, making one outbound attempt, or reading an
//! established channel. Workers report outcomes back into the service and
//! never decide state themselves; the service discards outcomes from workers
//! that are no longer registered.

pub(crate) mod accept;
pub(crate) mod connect;
pub(crate) mod connected;

use rfchat_core::{BoxServerSocket, WorkerId, WorkerKind};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

// ----------------------------------------------------------------------------
// Listener Ownership
// ----------------------------------------------------------------------------

/// Listener owned by an accept worker
///
/// Fields drop in declaration order: the socket is closed before the release
/// signal fires.
pub(crate) struct OwnedListener {
    pub(crate) socket: BoxServerSocket,
    _released: oneshot::Sender<()>,
}

impl OwnedListener {
    pub(crate) fn new(socket: BoxServerSocket) -> (Self, ListenerRelease) {
        let (released, release) = oneshot::channel();
        (
            Self {
                socket,
                _released: released,
            },
            ListenerRelease(release),
        )
    }
}

/// Resolves once an accept worker has closed its listener
#[derive(Debug)]
pub(crate) struct ListenerRelease(oneshot::Receiver<()>);

impl ListenerRelease {
    pub(crate) async fn wait(self) {
        // The sender is never used; only its drop matters
        let _ = self.0.await;
    }
}

// ----------------------------------------------------------------------------
// Worker Registration
// ----------------------------------------------------------------------------

/// Registration of a running worker inside the service
///
/// Dropping the handle cancels the worker: its pending accept, connect or
/// read is abandoned and the transport handle it owns is closed as soon as
/// the task observes the cancellation.
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    id: WorkerId,
    kind: WorkerKind,
    cancel: CancellationToken,
    release: Option<ListenerRelease>,
}

impl WorkerHandle {
    pub(crate) fn new(id: WorkerId, kind: WorkerKind, cancel: CancellationToken) -> Self {
        Self {
            id,
            kind,
            cancel,
            release: None,
        }
    }

    /// Attach the signal of the listener this worker owns
    pub(crate) fn with_release(mut self, release: ListenerRelease) -> Self {
        self.release = Some(release);
        self
    }

    pub(crate) fn id(&self) -> WorkerId {
        self.id
    }

    pub(crate) fn kind(&self) -> WorkerKind {
        self.kind
    }

    /// Request the worker to stop without waiting for it
    pub(crate) fn cancel(self) {
        debug!("Cancelling {} worker {}", self.kind, self.id);
        drop(self);
    }

    /// Cancel the worker and keep the signal of its listener, if it owns one
    pub(crate) fn cancel_listener(mut self) -> Option<ListenerRelease> {
        let release = self.release.take();
        self.cancel();
        release
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
