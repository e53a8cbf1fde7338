//! Events emitted by pipeline components, and handling of those events
//!
//! Components such as [`SpeechRate`] do not produce a further sample stream
//! but discrete, labeled results. These are passed as [`Event`]s to all
//! callbacks registered with the component's [`EventHandlers`]; writers and
//! feedback actuators subscribe there.
//!
//! [`SpeechRate`]: crate::analysis::speech_rate::SpeechRate

use parking_lot::Mutex;
use tokio::sync::mpsc;

use std::any::Any;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};

/// Types that can be passed to event handlers
pub trait Event: Any + Debug + Send + Sync {
    /// Name of the event (e.g. `"SpeechRate"`)
    fn name(&self) -> &str;
    /// Payload rendered as text
    fn text(&self) -> String;
    /// Returns dynamic reference, suitable for type checking and downcasting
    fn as_any(&self) -> &(dyn Any + Send + Sync);
}

type BoxedCallback = Box<dyn FnMut(&Arc<dyn Event>) + Send>;

struct IdentifiedCallback {
    callback: BoxedCallback,
    id: u64,
}

#[derive(Default)]
struct CallbackRegistry {
    callbacks: Vec<IdentifiedCallback>,
    next_id: u64,
}

/// Synchronized list of callbacks for handling [`Event`]s
#[derive(Clone, Default)]
pub struct EventHandlers(Arc<Mutex<CallbackRegistry>>);

impl EventHandlers {
    /// Empty list of event handlers
    pub fn new() -> Self {
        Default::default()
    }
}

/// Guard which unregisters an event handler when dropped
///
/// This guard is returned by [`EventHandlers::register`]. Use the [`forget`]
/// method to consume the guard without unregistering the handler.
///
/// [`forget`]: EventHandlerGuard::forget
#[must_use]
pub struct EventHandlerGuard {
    callbacks: Weak<Mutex<CallbackRegistry>>,
    id: u64,
    auto: bool,
}

impl Drop for EventHandlerGuard {
    fn drop(&mut self) {
        if self.auto {
            if let Some(callbacks) = Weak::upgrade(&self.callbacks) {
                callbacks.lock().callbacks.retain(|x| x.id != self.id);
            }
        }
    }
}

impl EventHandlerGuard {
    /// Unregister event handler (same as dropping)
    pub fn unregister(self) {}
    /// Consume guard without unregistering event handler
    pub fn forget(mut self) {
        self.auto = false;
    }
}

impl EventHandlers {
    /// Register event handler
    pub fn register<F: FnMut(&Arc<dyn Event>) + Send + 'static>(
        &self,
        func: F,
    ) -> EventHandlerGuard {
        let mut registry = self.0.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.callbacks.push(IdentifiedCallback {
            callback: Box::new(func),
            id,
        });
        drop(registry);
        EventHandlerGuard {
            callbacks: Arc::downgrade(&self.0),
            id,
            auto: true,
        }
    }
    /// Invoke all event handlers
    pub fn invoke(&self, event: &Arc<dyn Event>) {
        for IdentifiedCallback { callback, .. } in self.0.lock().callbacks.iter_mut() {
            callback(event);
        }
    }
    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.0.lock().callbacks.len()
    }
    /// True if no handler is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Wait for closure to return true on event
    pub fn wait_for_event<F>(&self, mut func: F) -> Pin<Box<dyn Future<Output = ()> + Send>>
    where
        F: FnMut(&Arc<dyn Event>) -> bool + Send + 'static,
    {
        let (waiter_tx, mut waiter_rx) = mpsc::unbounded_channel::<()>();
        let handle = self.register(move |event| {
            if func(event) {
                waiter_tx.send(()).ok();
            }
        });
        Box::pin(async move {
            waiter_rx.recv().await;
            handle.unregister();
        })
    }
}
