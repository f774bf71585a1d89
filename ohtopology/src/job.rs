//! Deferred listener notifications

use std::fmt;

use crate::handler::TopologyHandler;
use crate::model::Group;

/// Which listener callback a job selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notification {
    Added,
    StandbyChanged,
    SourceIndexChanged,
    SourceListChanged,
    Removed,
}

impl Notification {
    pub fn name(&self) -> &'static str {
        match self {
            Notification::Added => "GroupAdded",
            Notification::StandbyChanged => "GroupStandbyChanged",
            Notification::SourceIndexChanged => "GroupSourceIndexChanged",
            Notification::SourceListChanged => "GroupSourceListChanged",
            Notification::Removed => "GroupRemoved",
        }
    }

    /// Call the matching method on `handler`.
    pub fn dispatch<H: TopologyHandler + ?Sized>(self, handler: &mut H, group: &Group) {
        match self {
            Notification::Added => handler.group_added(group),
            Notification::StandbyChanged => handler.group_standby_changed(group),
            Notification::SourceIndexChanged => handler.group_source_index_changed(group),
            Notification::SourceListChanged => handler.group_source_list_changed(group),
            Notification::Removed => handler.group_removed(group),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

enum JobKind {
    Idle,
    Notify {
        sequence: u64,
        notification: Notification,
        group: Group,
    },
    Shutdown,
}

/// Reusable slot cycled between the free and ready pools.
///
/// A filled job holds one reference to its group; executing the job
/// releases it.
pub(crate) struct Job {
    kind: JobKind,
}

impl Job {
    pub fn idle() -> Self {
        Self { kind: JobKind::Idle }
    }

    pub fn fill(&mut self, sequence: u64, notification: Notification, group: Group) {
        debug_assert!(matches!(self.kind, JobKind::Idle));
        self.kind = JobKind::Notify {
            sequence,
            notification,
            group,
        };
    }

    pub fn fill_shutdown(&mut self) {
        self.kind = JobKind::Shutdown;
    }

    /// Run the job and leave it idle. Returns `false` for the shutdown
    /// sentinel.
    pub fn execute<H: TopologyHandler + ?Sized>(&mut self, handler: &mut H) -> bool {
        match std::mem::replace(&mut self.kind, JobKind::Idle) {
            JobKind::Idle => true,
            JobKind::Notify {
                sequence,
                notification,
                group,
            } => {
                tracing::trace!(
                    "Dispatching #{} {} for {}",
                    sequence,
                    notification,
                    group.udn()
                );
                notification.dispatch(handler, &group);
                true
            }
            JobKind::Shutdown => false,
        }
    }
}
