//! Deferred destruction for one resource kind

use std::collections::VecDeque;

use super::GpuResource;
use crate::foundation::collections::{Handle, ResourceKey, SlotMap};
use crate::render::backend::GpuDevice;
use crate::render::error::{RenderError, RenderResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Live,
    PendingDestroy,
}

struct Entry<T> {
    resource: T,
    name: String,
    state: EntryState,
}

/// A destruction request stamped with the last frame generation that may use
/// the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingDestruction {
    /// Key of the resource waiting to be freed
    pub key: ResourceKey,
    /// Submission generation that must retire first
    pub generation: u64,
}

/// Owns every registered resource of one kind and frees them only once the
/// GPU can no longer reference them
///
/// Resources live in a generation-stamped slot map. A destroy request keeps
/// the handle resolvable until a cleanup pass frees it; after that the key is
/// gone and a stale handle resolves to nothing, even if the slot is reused.
pub struct ResourceManager<T: GpuResource> {
    entries: SlotMap<ResourceKey, Entry<T>>,
    pending: VecDeque<PendingDestruction>,
    freed: u64,
}

impl<T: GpuResource> ResourceManager<T> {
    /// Create an empty manager
    pub fn new() -> Self {
        Self {
            entries: SlotMap::with_key(),
            pending: VecDeque::new(),
            freed: 0,
        }
    }

    /// Take ownership of a resource and return its handle
    pub fn add(&mut self, resource: T, name: impl Into<String>) -> Handle<T> {
        let name = name.into();
        log::trace!("Registered {} '{}'", T::KIND, name);
        Handle::new(self.entries.insert(Entry {
            resource,
            name,
            state: EntryState::Live,
        }))
    }

    /// Look up a resource
    ///
    /// Resources queued for destruction still resolve; freed ones do not.
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        let entry = self.entries.get(handle.key());
        if entry.is_none() {
            log::warn!("Use after destroy: {} handle {:?} no longer resolves", T::KIND, handle.key());
        }
        entry.map(|entry| &entry.resource)
    }

    /// Debug name given at registration
    pub fn name(&self, handle: Handle<T>) -> Option<&str> {
        self.entries.get(handle.key()).map(|entry| entry.name.as_str())
    }

    /// True while the handle resolves and no destroy request is pending
    pub fn is_live(&self, handle: Handle<T>) -> bool {
        self.entries
            .get(handle.key())
            .is_some_and(|entry| entry.state == EntryState::Live)
    }

    /// Request destruction once `generation` has retired on the GPU
    ///
    /// The resource is not freed here. Repeated requests, or requests for a
    /// resource that is already gone, log a double-destroy warning and do
    /// nothing else.
    pub fn enqueue_destroy(&mut self, handle: Handle<T>, generation: u64) {
        let Some(entry) = self.entries.get_mut(handle.key()) else {
            log::warn!(
                "DoubleDestroyWarning: {} handle {:?} was already destroyed",
                T::KIND,
                handle.key()
            );
            return;
        };

        if entry.state == EntryState::PendingDestroy {
            log::warn!(
                "DoubleDestroyWarning: {} '{}' is already queued for destruction",
                T::KIND,
                entry.name
            );
            return;
        }

        entry.state = EntryState::PendingDestroy;
        // Stamps come from a monotonic counter, so the queue stays sorted
        // unless a caller passes an older generation; keep it sorted anyway.
        let request = PendingDestruction {
            key: handle.key(),
            generation,
        };
        let position = self
            .pending
            .iter()
            .rposition(|pending| pending.generation <= generation)
            .map_or(0, |index| index + 1);
        self.pending.insert(position, request);
    }

    /// Free every pending resource whose generation is at or below
    /// `retired_generation`; safe to call every frame
    pub fn try_cleanup<D: GpuDevice + ?Sized>(&mut self, device: &D, retired_generation: u64) -> usize {
        let mut count = 0;
        while let Some(request) = self.pending.pop_front() {
            if request.generation > retired_generation {
                self.pending.push_front(request);
                break;
            }
            self.free(device, request.key);
            count += 1;
        }
        if count > 0 {
            log::debug!(
                "Freed {} {} resource(s) retired by generation {}",
                count,
                T::KIND,
                retired_generation
            );
        }
        count
    }

    /// Fallback cleanup: wait for the device to go idle, then free every
    /// pending resource regardless of its generation
    pub fn cleanup_after_idle<D: GpuDevice + ?Sized>(&mut self, device: &D) -> RenderResult<usize> {
        device
            .device_wait_idle()
            .map_err(|result| RenderError::device_lost("vkDeviceWaitIdle", result))?;
        Ok(self.free_pending(device))
    }

    /// Teardown: wait for idle once, then free everything, pending or live
    pub fn cleanup_all<D: GpuDevice + ?Sized>(&mut self, device: &D) -> RenderResult<usize> {
        device
            .device_wait_idle()
            .map_err(|result| RenderError::device_lost("vkDeviceWaitIdle", result))?;
        Ok(self.destroy_all(device))
    }

    /// Free everything without waiting; the caller has already waited idle
    pub(crate) fn destroy_all<D: GpuDevice + ?Sized>(&mut self, device: &D) -> usize {
        self.pending.clear();
        let mut count = 0;
        for (_, entry) in self.entries.drain() {
            log::trace!("Destroying {} '{}'", T::KIND, entry.name);
            entry.resource.destroy(device);
            count += 1;
        }
        self.freed += count as u64;
        count
    }

    fn free_pending<D: GpuDevice + ?Sized>(&mut self, device: &D) -> usize {
        let mut count = 0;
        while let Some(request) = self.pending.pop_front() {
            self.free(device, request.key);
            count += 1;
        }
        count
    }

    fn free<D: GpuDevice + ?Sized>(&mut self, device: &D, key: ResourceKey) {
        match self.entries.remove(key) {
            Some(entry) => {
                log::trace!("Destroying {} '{}'", T::KIND, entry.name);
                entry.resource.destroy(device);
                self.freed += 1;
            }
            None => log::warn!("DoubleDestroyWarning: pending {} {:?} vanished", T::KIND, key),
        }
    }

    /// Registered resources, including ones awaiting destruction
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resources waiting for their generation to retire
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Total resources freed over the manager's lifetime
    pub const fn freed_count(&self) -> u64 {
        self.freed
    }
}

impl<T: GpuResource> Default for ResourceManager<T> {
    fn default() -> Self {
        Self::new()
    }
}
