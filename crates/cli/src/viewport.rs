use std::sync::{Mutex, PoisonError};

/// Visible terminal area in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSize {
    pub columns: usize,
    pub rows: usize,
}

pub type ViewportCallback = Box<dyn FnMut(ViewportSize) + Send>;

/// Host capability reporting the usable viewport and its changes.
pub trait ViewportSource: Send + Sync {
    fn current(&self) -> ViewportSize;

    /// Registers `callback`; it fires once immediately and again on every change.
    fn on_viewport_change(&self, callback: ViewportCallback);
}

/// Viewport with a size set by the host, e.g. from settings.
pub struct FixedViewport {
    size: Mutex<ViewportSize>,
    callbacks: Mutex<Vec<ViewportCallback>>,
}

impl FixedViewport {
    pub fn new(size: ViewportSize) -> Self {
        Self {
            size: Mutex::new(size),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_columns(columns: usize) -> Self {
        Self::new(ViewportSize { columns, rows: 24 })
    }

    pub fn resize(&self, size: ViewportSize) {
        {
            let mut current = self.size.lock().unwrap_or_else(PoisonError::into_inner);
            if *current == size {
                return;
            }
            *current = size;
        }

        let mut callbacks = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
        for callback in callbacks.iter_mut() {
            callback(size);
        }
    }
}

impl ViewportSource for FixedViewport {
    fn current(&self) -> ViewportSize {
        *self.size.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_viewport_change(&self, mut callback: ViewportCallback) {
        callback(self.current());
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
    }
}
