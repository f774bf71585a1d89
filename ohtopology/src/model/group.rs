//! Per-device cached topology state.
//!
//! A [`Group`] is what the listener sees: read accessors plus two commands
//! that are forwarded to the owning adapter. Mutation goes through
//! [`GroupUpdater`], which only the adapter holds.
//!
//! Cloning a `Group` takes a reference and dropping it releases one; the
//! state is freed when the last clone goes, whether that is the adapter's,
//! a queued job's, or one the listener kept.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use ohtopology_discovery::Device;
use ohtopology_parser::SourceRecord;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use super::{bounded, Source};
use crate::error::{Result, TopologyError};

/// Opaque caller-managed value attached to a group.
pub type UserData = Arc<dyn Any + Send + Sync>;

/// Receiver of the commands issued through [`Group::set_standby`] and
/// [`Group::set_source_index`].
pub(crate) trait GroupHandler: Send + Sync {
    fn set_standby(&self, value: bool) -> Result<()>;
    fn set_source_index(&self, index: usize) -> Result<()>;
}

/// Full state read from a device when its group is created.
#[derive(Debug, Clone)]
pub(crate) struct GroupInit {
    pub standby: bool,
    pub room: String,
    pub name: String,
    pub source_index: usize,
    pub sources: Vec<SourceRecord>,
    pub has_volume_control: bool,
}

struct GroupState {
    standby: bool,
    room: String,
    name: String,
    source_index: usize,
    sources: Vec<Source>,
}

impl GroupState {
    fn add_source(&mut self, record: &SourceRecord) {
        self.sources
            .push(Source::new(&record.name, &record.source_type, record.visible));
    }

    fn update_source(&mut self, index: usize, record: &SourceRecord) {
        if let Some(source) = self.sources.get_mut(index) {
            source.update(&record.name, &record.source_type, record.visible);
        }
    }

    fn clamp_source_index(&mut self) {
        let last = self.sources.len().saturating_sub(1);
        if self.source_index > last {
            self.source_index = last;
        }
    }
}

struct GroupInner {
    device: Device,
    handler: Weak<dyn GroupHandler>,
    has_volume_control: bool,
    state: RwLock<GroupState>,
    user_data: Mutex<Option<UserData>>,
}

impl Drop for GroupInner {
    fn drop(&mut self) {
        tracing::trace!("Group {} released", self.device.udn);
    }
}

/// Cached topology of one renderer.
#[derive(Clone)]
pub struct Group {
    inner: Arc<GroupInner>,
}

impl Group {
    /// Longest room name kept, in bytes
    pub const MAX_ROOM_BYTES: usize = 64;
    /// Longest group name kept, in bytes
    pub const MAX_NAME_BYTES: usize = 64;

    /// The device this group mirrors.
    pub fn device(&self) -> &Device {
        &self.inner.device
    }

    pub fn udn(&self) -> &str {
        &self.inner.device.udn
    }

    pub fn standby(&self) -> bool {
        self.inner.state.read().standby
    }

    /// Ask the device to change standby.
    ///
    /// Cached state is not touched; it follows once the device reports the
    /// change, and [`GroupStandbyChanged`](crate::TopologyHandler::group_standby_changed)
    /// fires then.
    pub fn set_standby(&self, value: bool) -> Result<()> {
        self.handler()?.set_standby(value)
    }

    pub fn room(&self) -> String {
        self.inner.state.read().room.clone()
    }

    pub fn name(&self) -> String {
        self.inner.state.read().name.clone()
    }

    pub fn source_count(&self) -> usize {
        self.inner.state.read().sources.len()
    }

    pub fn source_index(&self) -> usize {
        self.inner.state.read().source_index
    }

    /// Ask the device to select source `index`.
    ///
    /// # Errors
    ///
    /// `InvalidSourceIndex` if `index` is not below [`source_count`](Self::source_count),
    /// `CommandPending` while an earlier selection is still outstanding.
    pub fn set_source_index(&self, index: usize) -> Result<()> {
        let count = self.source_count();
        if index >= count {
            return Err(TopologyError::InvalidSourceIndex { index, count });
        }
        self.handler()?.set_source_index(index)
    }

    /// # Panics
    ///
    /// If `index` is not below [`source_count`](Self::source_count).
    pub fn source_name(&self, index: usize) -> String {
        self.with_source(index, |s| s.name().to_string())
    }

    /// # Panics
    ///
    /// If `index` is not below [`source_count`](Self::source_count).
    pub fn source_type(&self, index: usize) -> String {
        self.with_source(index, |s| s.source_type().to_string())
    }

    /// # Panics
    ///
    /// If `index` is not below [`source_count`](Self::source_count).
    pub fn source_visible(&self, index: usize) -> bool {
        self.with_source(index, Source::visible)
    }

    /// Non-panicking lookup.
    pub fn source(&self, index: usize) -> Option<Source> {
        self.inner.state.read().sources.get(index).cloned()
    }

    pub fn sources(&self) -> Vec<Source> {
        self.inner.state.read().sources.clone()
    }

    pub fn has_volume_control(&self) -> bool {
        self.inner.has_volume_control
    }

    pub fn set_user_data(&self, data: Option<UserData>) {
        *self.inner.user_data.lock() = data;
    }

    pub fn user_data(&self) -> Option<UserData> {
        self.inner.user_data.lock().clone()
    }

    /// Number of live references: the adapter's, queued jobs', and any clones
    /// held by the application.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Observe the group without keeping it alive.
    pub fn downgrade(&self) -> WeakGroup {
        WeakGroup {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether both handles refer to the same group.
    pub fn ptr_eq(&self, other: &Group) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Owned copy of every field, read under one lock.
    pub fn snapshot(&self) -> GroupSnapshot {
        let state = self.inner.state.read();
        GroupSnapshot {
            udn: self.inner.device.udn.clone(),
            standby: state.standby,
            room: state.room.clone(),
            name: state.name.clone(),
            source_index: state.source_index,
            sources: state.sources.clone(),
            has_volume_control: self.inner.has_volume_control,
        }
    }

    fn handler(&self) -> Result<Arc<dyn GroupHandler>> {
        self.inner.handler.upgrade().ok_or_else(|| {
            tracing::debug!("Command on group {} after its adapter went away", self.udn());
            TopologyError::GroupDetached
        })
    }

    fn with_source<R>(&self, index: usize, f: impl FnOnce(&Source) -> R) -> R {
        let state = self.inner.state.read();
        match state.sources.get(index) {
            Some(source) => f(source),
            None => panic!(
                "source index {} out of range for group {} with {} sources",
                index,
                self.inner.device.udn,
                state.sources.len()
            ),
        }
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Group")
            .field("udn", &self.inner.device.udn)
            .field("room", &state.room)
            .field("name", &state.name)
            .field("standby", &state.standby)
            .field("source_index", &state.source_index)
            .field("source_count", &state.sources.len())
            .finish()
    }
}

/// Non-owning reference to a [`Group`].
#[derive(Clone)]
pub struct WeakGroup {
    inner: Weak<GroupInner>,
}

impl WeakGroup {
    pub fn upgrade(&self) -> Option<Group> {
        self.inner.upgrade().map(|inner| Group { inner })
    }

    /// Whether the group has been freed.
    pub fn is_released(&self) -> bool {
        self.inner.strong_count() == 0
    }
}

impl fmt::Debug for WeakGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakGroup")
            .field("released", &self.is_released())
            .finish()
    }
}

/// Serializable copy of a group's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSnapshot {
    pub udn: String,
    pub standby: bool,
    pub room: String,
    pub name: String,
    pub source_index: usize,
    pub sources: Vec<Source>,
    pub has_volume_control: bool,
}

/// Write access to a group. Held only by the owning adapter, and counts as
/// the adapter's reference.
pub(crate) struct GroupUpdater {
    group: Group,
}

impl GroupUpdater {
    pub fn new(device: Device, handler: Weak<dyn GroupHandler>, init: GroupInit) -> Self {
        let mut state = GroupState {
            standby: init.standby,
            room: bounded(&init.room, Group::MAX_ROOM_BYTES),
            name: bounded(&init.name, Group::MAX_NAME_BYTES),
            source_index: init.source_index,
            sources: Vec::with_capacity(init.sources.len()),
        };
        for record in &init.sources {
            state.add_source(record);
        }
        state.clamp_source_index();

        Self {
            group: Group {
                inner: Arc::new(GroupInner {
                    device,
                    handler,
                    has_volume_control: init.has_volume_control,
                    state: RwLock::new(state),
                    user_data: Mutex::new(None),
                }),
            },
        }
    }

    /// A new reference for handing to the queue.
    pub fn group(&self) -> Group {
        self.group.clone()
    }

    pub fn update_room(&self, value: &str) {
        self.group.inner.state.write().room = bounded(value, Group::MAX_ROOM_BYTES);
    }

    pub fn update_name(&self, value: &str) {
        self.group.inner.state.write().name = bounded(value, Group::MAX_NAME_BYTES);
    }

    /// Returns whether the value changed.
    pub fn update_standby(&self, value: bool) -> bool {
        let mut state = self.group.inner.state.write();
        let changed = state.standby != value;
        state.standby = value;
        changed
    }

    /// Returns whether the value changed. Rejects indices outside the list.
    pub fn update_source_index(&self, index: usize) -> Result<bool> {
        let mut state = self.group.inner.state.write();
        let count = state.sources.len();
        if index >= count && !(count == 0 && index == 0) {
            return Err(TopologyError::InvalidSourceIndex { index, count });
        }
        let changed = state.source_index != index;
        state.source_index = index;
        Ok(changed)
    }

    /// Replace the source list by position: existing slots are updated in
    /// place, extra records appended, surplus slots dropped.
    ///
    /// Returns whether the stored list differs from before.
    pub fn replace_sources(&self, records: &[SourceRecord]) -> bool {
        let mut state = self.group.inner.state.write();
        let existing = state.sources.len();
        let mut changed = existing != records.len();

        for (index, record) in records.iter().enumerate() {
            if index < existing {
                let before = state.sources[index].clone();
                state.update_source(index, record);
                changed |= state.sources[index] != before;
            } else {
                state.add_source(record);
            }
        }
        state.sources.truncate(records.len());
        state.clamp_source_index();
        changed
    }
}
