//! Cross-thread mutation queue.
//!
//! The renderer may only be touched on the thread that owns the graphics
//! context. Other threads submit closures here; the owning thread applies them,
//! in submission order, at the start of [`Renderer::render_frame`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::GraphicsBackend;
use crate::renderer::Renderer;

/// A boxed closure that mutates the renderer.
type Call<B> = Box<dyn FnOnce(&mut Renderer<B>) + Send>;

/// A thread-safe, cloneable handle for queueing renderer mutations.
///
/// # Example
///
/// ```
/// use retained_graphics::{DummyBackend, Renderer};
///
/// let mut renderer = Renderer::new(DummyBackend::new());
/// let queue = renderer.call_queue();
///
/// std::thread::spawn(move || {
///     queue.submit(|renderer| {
///         renderer.set_system_value("time", 1.5f32).unwrap();
///     });
/// })
/// .join()
/// .unwrap();
///
/// renderer.render_frame().unwrap();
/// assert!(renderer.system_value("time").is_some());
/// ```
pub struct CallQueue<B: GraphicsBackend> {
    calls: Arc<Mutex<Vec<Call<B>>>>,
}

impl<B: GraphicsBackend> CallQueue<B> {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a closure to run on the owning thread.
    pub fn submit(&self, call: impl FnOnce(&mut Renderer<B>) + Send + 'static) {
        self.calls.lock().push(Box::new(call));
    }

    /// Take every queued call, oldest first.
    pub(crate) fn drain(&self) -> Vec<Call<B>> {
        std::mem::take(&mut *self.calls.lock())
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}

impl<B: GraphicsBackend> Clone for CallQueue<B> {
    fn clone(&self) -> Self {
        Self {
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<B: GraphicsBackend> Default for CallQueue<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: GraphicsBackend> std::fmt::Debug for CallQueue<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallQueue")
            .field("pending", &self.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(CallQueue<crate::backend::DummyBackend>: Send, Sync, Clone);
