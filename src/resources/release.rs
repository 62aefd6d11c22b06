//! Deferred release of native handles.
//!
//! Buffers and programs are reference-counted and may be dropped on any thread
//! (for instance inside a closure submitted through the call queue). Native
//! handles however must be released on the thread that owns the graphics
//! context, so the last drop only enqueues the handle here:
//!
//! ```text
//! On Drop(last reference):
//!   1. Don't call the backend
//!   2. Push the native handle onto the ReleaseQueue
//!
//! On frame boundary (owning thread):
//!   1. Drain the queue
//!   2. Release every handle through the backend
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{BufferHandle, GraphicsBackend, ProgramHandle};

/// A native handle waiting to be released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingRelease {
    Buffer(BufferHandle),
    Program(ProgramHandle),
}

/// Queue of native handles whose last owner has been dropped.
#[derive(Clone, Default)]
pub struct ReleaseQueue {
    pending: Arc<Mutex<Vec<PendingRelease>>>,
}

impl ReleaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, release: PendingRelease) {
        self.pending.lock().push(release);
    }

    /// Release every queued handle through `backend`, oldest first.
    ///
    /// Returns how many handles were released.
    pub fn drain(&self, backend: &mut dyn GraphicsBackend) -> usize {
        let pending = std::mem::take(&mut *self.pending.lock());
        for release in &pending {
            match *release {
                PendingRelease::Buffer(handle) => backend.release_buffer(handle),
                PendingRelease::Program(handle) => backend.release_program(handle),
            }
        }
        if !pending.is_empty() {
            log::debug!("Released {} native handles", pending.len());
        }
        pending.len()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

impl std::fmt::Debug for ReleaseQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseQueue")
            .field("pending", &self.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(ReleaseQueue: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, BufferKind, DummyBackend};

    #[test]
    fn test_drain_releases_in_order() {
        let mut backend = DummyBackend::new();
        let a = backend.create_buffer(BufferKind::Vertex, &[]).unwrap();
        let b = backend.create_buffer(BufferKind::Index, &[]).unwrap();
        backend.take_calls();

        let queue = ReleaseQueue::new();
        queue.push(PendingRelease::Buffer(b));
        queue.push(PendingRelease::Buffer(a));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.drain(&mut backend), 2);
        assert!(queue.is_empty());
        assert_eq!(
            backend.calls(),
            &[BackendCall::ReleaseBuffer(b), BackendCall::ReleaseBuffer(a)]
        );
        assert_eq!(backend.live_buffer_count(), 0);
    }

    #[test]
    fn test_queue_is_shared_between_clones() {
        let queue = ReleaseQueue::new();
        let clone = queue.clone();
        std::thread::spawn(move || clone.push(PendingRelease::Program(ProgramHandle(7))))
            .join()
            .unwrap();
        assert_eq!(queue.len(), 1);
    }
}
