//! Per-device adapters.
//!
//! An adapter owns the one [`Group`] for its device and is the only thing
//! that mutates it. Lifecycle:
//!
//! ```text
//! Subscribing --initial state read--> Active --device gone--> Removing --> Detached
//! ```
//!
//! The group is created on the way into `Active` and released on the way
//! out of `Removing`. Nothing is notified while `Subscribing`.
//!
//! Notifications are decided under the group lock but only enter the job
//! queue after it is released, through a per-adapter outbox. A producer
//! waiting for a free job therefore never holds a lock the dispatch thread
//! might need.

mod media_renderer;
mod product;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use ohtopology_discovery::Device;
use parking_lot::Mutex;

pub(crate) use media_renderer::MediaRendererAdapter;
pub(crate) use product::ProductAdapter;

use crate::error::{Result, TopologyError};
use crate::job::Notification;
use crate::job_queue::JobQueue;
use crate::model::{Group, GroupUpdater};

/// What the engine needs from an adapter, whatever the device kind.
pub(crate) trait DeviceAdapter: Send + Sync {
    fn device(&self) -> &Device;

    /// Begin tracking the device. Called once, after the adapter is recorded.
    fn start(&self);

    /// The device has gone: stop tracking, send `GroupRemoved`, release the group.
    fn remove(&self);

    /// Stop tracking and release the group without notifying.
    fn detach(&self);

    /// Whether the group has been published and not yet removed.
    fn is_active(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Phase {
    Subscribing = 0,
    Active = 1,
    Removing = 2,
    Detached = 3,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Phase::Subscribing,
            1 => Phase::Active,
            2 => Phase::Removing,
            _ => Phase::Detached,
        }
    }
}

/// Lifecycle and group ownership shared by every adapter kind.
pub(crate) struct AdapterCore {
    pub device: Device,
    pub queue: Arc<JobQueue>,
    phase: AtomicU8,
    /// Held for the whole of every state change. Notifications are pushed
    /// to `outbox` under it, so the outbox is in the order things happened.
    pub group: Mutex<Option<GroupUpdater>>,
    outbox: Mutex<VecDeque<(Group, Notification)>>,
    /// Held while moving the outbox into the queue
    delivery: Mutex<()>,
}

impl AdapterCore {
    pub fn new(device: Device, queue: Arc<JobQueue>) -> Self {
        Self {
            device,
            queue,
            phase: AtomicU8::new(Phase::Subscribing as u8),
            group: Mutex::new(None),
            outbox: Mutex::new(VecDeque::new()),
            delivery: Mutex::new(()),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Store a freshly built group and announce it.
    ///
    /// `slot` must be the guarded contents of `self.group`; call
    /// [`flush`](Self::flush) once that guard is dropped. Returns `false`
    /// when removal started first; the group is then dropped unannounced.
    pub fn publish(&self, slot: &mut Option<GroupUpdater>, updater: GroupUpdater) -> bool {
        if self
            .phase
            .compare_exchange(
                Phase::Subscribing as u8,
                Phase::Active as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            tracing::debug!("{} removed before its group was published", self.device.udn);
            return false;
        }

        let group = updater.group();
        *slot = Some(updater);
        tracing::info!(
            "Group added: {} ({} / {})",
            group.udn(),
            group.room(),
            group.name()
        );
        self.outbox.lock().push_back((group, Notification::Added));
        true
    }

    /// Record `notification` for delivery by the next [`flush`](Self::flush).
    /// Call with the group lock held.
    pub fn notify(&self, updater: &GroupUpdater, notification: Notification) {
        let group = updater.group();
        tracing::debug!("{} for {}", notification, group.udn());
        self.outbox.lock().push_back((group, notification));
    }

    /// Move recorded notifications into the job queue, oldest first. Must be
    /// called without the group lock held.
    ///
    /// On the dispatch thread this never waits: if another thread is already
    /// delivering, that thread picks up whatever was recorded here.
    pub fn flush(&self) {
        loop {
            let delivering = if self.queue.is_dispatch_thread() {
                match self.delivery.try_lock() {
                    Some(guard) => guard,
                    None => return,
                }
            } else {
                self.delivery.lock()
            };

            loop {
                let next = self.outbox.lock().pop_front();
                let Some((group, notification)) = next else {
                    break;
                };
                self.queue.enqueue(&group, notification);
            }
            drop(delivering);

            // Something may have been recorded by a thread that found us busy
            if self.outbox.lock().is_empty() {
                return;
            }
        }
    }

    /// Move to `Removing` from `Subscribing` or `Active`. Returns `false` if
    /// removal already began.
    pub fn begin_removal(&self) -> bool {
        self.phase
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |value| {
                match Phase::from_u8(value) {
                    Phase::Subscribing | Phase::Active => Some(Phase::Removing as u8),
                    Phase::Removing | Phase::Detached => None,
                }
            })
            .is_ok()
    }

    /// Drop the adapter's hold on its group, announcing the removal if asked.
    pub fn release(&self, notify: bool) {
        {
            let mut slot = self.group.lock();
            if let Some(updater) = slot.take() {
                let group = updater.group();
                drop(updater);
                if notify {
                    tracing::info!("Group removed: {}", group.udn());
                    self.outbox.lock().push_back((group, Notification::Removed));
                }
            }
            self.phase.store(Phase::Detached as u8, Ordering::Release);
        }
        self.flush();
    }

    /// Commands are only accepted while the group is published.
    pub fn ensure_active(&self) -> Result<()> {
        match self.phase() {
            Phase::Active => Ok(()),
            phase => {
                tracing::debug!("Command on {} ignored in {:?}", self.device.udn, phase);
                Err(TopologyError::GroupDetached)
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase() == Phase::Active
    }

    /// The published group, if any.
    #[cfg(test)]
    pub fn group(&self) -> Option<Group> {
        self.group.lock().as_ref().map(GroupUpdater::group)
    }
}
