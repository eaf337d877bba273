//! Per-frame refresh trigger.
//!
//! Hosts call [`FrameObserver::dispatch_pre_draw`] once before each frame.
//! Listeners stay registered for as long as the [`Subscription`] returned by
//! [`RefreshTrigger::subscribe`] is alive.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

/// "Call me before every frame until I unsubscribe."
pub trait RefreshTrigger {
    fn subscribe(&self, callback: Box<dyn FnMut()>) -> Subscription;
}

/// Registration handle; dropping or cancelling it removes the listener.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

type Listener = Rc<RefCell<Box<dyn FnMut()>>>;

#[derive(Default)]
struct ObserverInner {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// In-process pre-draw observer list.
#[derive(Clone, Default)]
pub struct FrameObserver {
    inner: Rc<RefCell<ObserverInner>>,
}

impl fmt::Debug for FrameObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameObserver")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl FrameObserver {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Invoke every registered listener once. Returns how many ran.
    ///
    /// Listeners may unsubscribe (themselves or others) while the dispatch is
    /// running; a listener removed mid-dispatch is not invoked afterwards.
    pub fn dispatch_pre_draw(&self) -> usize {
        let snapshot: Vec<(u64, Listener)> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .map(|(id, listener)| (*id, Rc::clone(listener)))
            .collect();
        let mut invoked = 0;
        for (id, listener) in snapshot {
            let still_registered = self
                .inner
                .borrow()
                .listeners
                .iter()
                .any(|(other, _)| *other == id);
            if !still_registered {
                continue;
            }
            // A listener that re-enters dispatch is skipped for the nested pass.
            if let Ok(mut callback) = listener.try_borrow_mut() {
                (*callback)();
                invoked += 1;
            }
        }
        trace!(invoked, "dispatched pre-draw");
        invoked
    }
}

impl RefreshTrigger for FrameObserver {
    fn subscribe(&self, callback: Box<dyn FnMut()>) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, Rc::new(RefCell::new(callback))));
            id
        };
        let registry: Weak<RefCell<ObserverInner>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = registry.upgrade() {
                inner.borrow_mut().listeners.retain(|(other, _)| *other != id);
            }
        })
    }
}
