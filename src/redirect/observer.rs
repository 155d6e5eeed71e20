//! Line observers and the registry that fans lines out to them

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Receives each completed line from a redirected channel.
///
/// Called on the redirector's monitor thread, one line at a time. A slow
/// observer slows the drain of the channel; a panicking observer ends the
/// monitor thread.
pub trait StreamObserver: Send + Sync {
    /// Handle one line, with its terminator already stripped.
    fn on_line(&self, line: &str);
}

impl<F> StreamObserver for F
where
    F: Fn(&str) + Send + Sync,
{
    fn on_line(&self, line: &str) {
        self(line)
    }
}

/// Ordered set of non-owning observer handles.
///
/// The registry never keeps an observer alive: callers own their observers
/// and should detach before dropping them. An observer dropped while still
/// attached is skipped and pruned on the next notification.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Mutex<Vec<Weak<dyn StreamObserver>>>,
}

fn same_observer(handle: &Weak<dyn StreamObserver>, addr: *const ()) -> bool {
    std::ptr::addr_eq(handle.as_ptr(), addr)
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Vec<Weak<dyn StreamObserver>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `observer` after every observer already attached.
    pub fn attach<O>(&self, observer: &Arc<O>)
    where
        O: StreamObserver + 'static,
    {
        let handle = Arc::downgrade(observer);
        let handle: Weak<dyn StreamObserver> = handle;
        self.lock().push(handle);
    }

    /// Remove every registration of `observer`, returning how many were removed.
    pub fn detach<O>(&self, observer: &Arc<O>) -> usize
    where
        O: StreamObserver + ?Sized,
    {
        let addr = Arc::as_ptr(observer) as *const ();
        let mut observers = self.lock();
        let before = observers.len();
        observers.retain(|handle| !same_observer(handle, addr));
        before - observers.len()
    }

    /// Deliver `line` to every live observer in registration order.
    ///
    /// The handle list is snapshotted first and the lock released before any
    /// observer runs, so observers may attach or detach from inside
    /// `on_line`. A detach that races with this call can still see one last
    /// delivery.
    pub fn notify_all(&self, line: &str) {
        let live: Vec<Arc<dyn StreamObserver>> = {
            let mut observers = self.lock();
            observers.retain(|handle| handle.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };

        for observer in live {
            observer.on_line(line);
        }
    }

    /// Number of attached observers that are still alive
    pub fn len(&self) -> usize {
        self.lock()
            .iter()
            .filter(|handle| handle.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}
