use std::sync::{Arc, Mutex, MutexGuard, Weak};

/// Callback invoked for every emitted event.
pub type Observer<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct RegistryInner<E> {
    next_id: u64,
    observers: Vec<(u64, Observer<E>)>,
    closed: bool,
}

/// Explicit observer registry owned by a single manager.
pub struct ObserverRegistry<E> {
    inner: Arc<Mutex<RegistryInner<E>>>,
}

impl<E> Clone for ObserverRegistry<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E> Default for ObserverRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ObserverRegistry<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                next_id: 0,
                observers: Vec::new(),
                closed: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner<E>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register an observer. The returned handle revokes it.
    ///
    /// Subscribing to a drained registry yields an inactive handle.
    pub fn subscribe<F>(&self, observer: F) -> Subscription<E>
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        if !inner.closed {
            inner.observers.push((id, Arc::new(observer)));
        }
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every current observer, in subscription order.
    pub fn emit(&self, event: &E) {
        // Snapshot so observers may subscribe/revoke without deadlocking.
        let observers: Vec<Observer<E>> = {
            let inner = self.lock();
            inner.observers.iter().map(|(_, o)| o.clone()).collect()
        };
        for observer in observers {
            observer(event);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every observer and refuse new ones. Returns how many were removed.
    pub fn drain(&self) -> usize {
        let mut inner = self.lock();
        inner.closed = true;
        let removed = inner.observers.len();
        inner.observers.clear();
        removed
    }
}

/// Revocation handle returned by [`ObserverRegistry::subscribe`].
///
/// Dropping the handle keeps the observer registered.
pub struct Subscription<E> {
    id: u64,
    registry: Weak<Mutex<RegistryInner<E>>>,
}

impl<E> Subscription<E> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        let Some(inner) = self.registry.upgrade() else {
            return false;
        };
        let guard = match inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.observers.iter().any(|(id, _)| *id == self.id)
    }

    /// Unregister the observer. Returns false if it was already gone.
    pub fn revoke(self) -> bool {
        let Some(inner) = self.registry.upgrade() else {
            return false;
        };
        let mut guard = match inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = guard.observers.len();
        guard.observers.retain(|(id, _)| *id != self.id);
        guard.observers.len() != before
    }
}
