//! Resource Pool
//!
//! Lazily creates and caches one long-lived handle per identifier. The first
//! caller for an identifier runs the injected factory; concurrent callers for
//! the same identifier wait on that creation and share its handle. Creation
//! of unrelated identifiers never serializes on a common lock.

use crate::error::{BackendError, ReleaseError};
use crate::resources::ManagedResource;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Creates and releases the handles cached by a [`ResourcePool`].
#[async_trait]
pub trait HandleFactory<H: ?Sized>: Send + Sync {
    async fn create(&self, id: &str) -> Result<Arc<H>, BackendError>;

    async fn release(&self, id: &str, handle: Arc<H>) -> Result<(), BackendError>;
}

/// One identifier's handle cell.
///
/// `released` is set by whichever path releases the handle first, so a handle
/// orphaned by `invalidate` during its creation is still released exactly once.
struct Slot<H: ?Sized> {
    cell: OnceCell<Arc<H>>,
    released: AtomicBool,
}

impl<H: ?Sized> Slot<H> {
    fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            released: AtomicBool::new(false),
        }
    }

    /// The handle, if created and not yet claimed for release.
    fn take_for_release(&self) -> Option<Arc<H>> {
        let handle = self.cell.get()?;
        if self.released.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(Arc::clone(handle))
    }
}

/// Lazy, shared handle cache keyed by identifier.
///
/// Handles are never evicted during a run. `close` must only be called once
/// every in-flight `get` has completed.
pub struct ResourcePool<H: ?Sized> {
    name: String,
    factory: Arc<dyn HandleFactory<H>>,
    slots: RwLock<HashMap<String, Arc<Slot<H>>>>,
    /// Slots in the order their handles were created.
    acquired: Mutex<Vec<(String, Arc<Slot<H>>)>>,
}

impl<H: ?Sized + Send + Sync + 'static> ResourcePool<H> {
    pub fn new(name: impl Into<String>, factory: Arc<dyn HandleFactory<H>>) -> Self {
        Self {
            name: name.into(),
            factory,
            slots: RwLock::new(HashMap::new()),
            acquired: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the handle for `id`, creating it on first use.
    ///
    /// A failed creation is not cached; the next caller tries again. A handle
    /// whose slot was invalidated while it was being created is released and
    /// creation starts over on the current slot.
    pub async fn get(&self, id: &str) -> Result<Arc<H>, BackendError> {
        loop {
            let existing = self.slots.read().get(id).cloned();
            if let Some(handle) = existing.as_ref().and_then(|slot| slot.cell.get()) {
                debug!(pool = %self.name, id, "Using cached handle");
                return Ok(Arc::clone(handle));
            }

            let slot = match existing {
                Some(slot) => slot,
                None => {
                    let mut slots = self.slots.write();
                    Arc::clone(
                        slots
                            .entry(id.to_string())
                            .or_insert_with(|| Arc::new(Slot::new())),
                    )
                }
            };

            // OnceCell re-checks after acquiring its per-slot permit, so only the
            // first waiter runs the factory.
            let handle = Arc::clone(slot.cell.get_or_try_init(|| self.create_handle(id)).await?);
            if self.record(id, &slot) {
                return Ok(handle);
            }

            drop(handle);
            if let Some(orphan) = slot.take_for_release() {
                warn!(pool = %self.name, id, "Handle created for an invalidated slot; releasing it");
                if let Err(err) = self.factory.release(id, orphan).await {
                    warn!(pool = %self.name, id, error = %err, "Failed to release orphaned handle");
                }
            }
        }
    }

    async fn create_handle(&self, id: &str) -> Result<Arc<H>, BackendError> {
        debug!(pool = %self.name, id, "Creating handle");
        let handle = self.factory.create(id).await?;
        info!(pool = %self.name, id, "Handle initialized");
        Ok(handle)
    }

    /// Track `slot` for release if it is still the live slot for `id`.
    ///
    /// Returns false when the slot has been invalidated.
    fn record(&self, id: &str, slot: &Arc<Slot<H>>) -> bool {
        let slots = self.slots.read();
        let current = slots.get(id).is_some_and(|live| Arc::ptr_eq(live, slot));
        if current {
            let mut acquired = self.acquired.lock();
            if !acquired.iter().any(|(_, known)| Arc::ptr_eq(known, slot)) {
                acquired.push((id.to_string(), Arc::clone(slot)));
            }
        }
        current
    }

    /// Whether a handle for `id` has been created and is still cached.
    pub fn is_cached(&self, id: &str) -> bool {
        self.slots
            .read()
            .get(id)
            .map(|slot| slot.cell.initialized())
            .unwrap_or(false)
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.acquired.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the cached entry for `id` and release its handle, if any.
    ///
    /// The next `get` creates a fresh handle. Returns whether a handle was
    /// released; a creation still in flight is released by its `get`.
    pub async fn invalidate(&self, id: &str) -> Result<bool, ReleaseError> {
        let removed = {
            let mut slots = self.slots.write();
            let mut acquired = self.acquired.lock();
            acquired.retain(|(existing, _)| existing != id);
            slots.remove(id)
        };

        let Some(handle) = removed.and_then(|slot| slot.take_for_release()) else {
            return Ok(false);
        };

        debug!(pool = %self.name, id, "Invalidating cached handle");
        self.factory
            .release(id, handle)
            .await
            .map(|_| true)
            .map_err(|err| ReleaseError::new(format!("{}/{}", self.name, id), err.to_string()))
    }

    /// Release every cached handle, newest first.
    ///
    /// Every handle gets a release attempt; failures are logged and returned.
    /// A second call finds nothing left to release.
    pub async fn close(&self) -> Vec<ReleaseError> {
        let order = {
            let mut slots = self.slots.write();
            let mut acquired = self.acquired.lock();
            slots.clear();
            std::mem::take(&mut *acquired)
        };

        debug!(pool = %self.name, count = order.len(), "Closing pool");
        let mut errors = Vec::new();
        for (id, slot) in order.iter().rev() {
            let Some(handle) = slot.take_for_release() else {
                continue;
            };
            debug!(pool = %self.name, id = %id, "Releasing handle");
            if let Err(err) = self.factory.release(id, handle).await {
                warn!(pool = %self.name, id = %id, error = %err, "Failed to release handle");
                errors.push(ReleaseError::new(
                    format!("{}/{}", self.name, id),
                    err.to_string(),
                ));
            }
        }
        errors
    }
}

#[async_trait]
impl<H: ?Sized + Send + Sync + 'static> ManagedResource for ResourcePool<H> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn close(&self) -> Vec<ReleaseError> {
        ResourcePool::close(self).await
    }
}
