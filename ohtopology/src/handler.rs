//! Listener interface for topology changes

use crate::model::Group;

/// Receives group lifecycle and state-change notifications.
///
/// Every method is called on the engine's dispatch thread, one call at a
/// time and in the order the changes were queued, so implementations need no
/// locking of their own. The `Group` stays valid for the whole call; clone it
/// to keep it longer.
///
/// Room and name changes have no callback of their own. Read them from the
/// group when any other notification arrives.
pub trait TopologyHandler: Send {
    /// A device finished its initial state read and is now visible.
    fn group_added(&mut self, group: &Group);

    fn group_standby_changed(&mut self, group: &Group);

    fn group_source_index_changed(&mut self, group: &Group);

    /// The whole source list was replaced. Sent once per replacement.
    fn group_source_list_changed(&mut self, group: &Group);

    /// Last notification for this group. The engine will not mention it again.
    fn group_removed(&mut self, group: &Group);
}

impl<H: TopologyHandler + ?Sized> TopologyHandler for Box<H> {
    fn group_added(&mut self, group: &Group) {
        (**self).group_added(group)
    }

    fn group_standby_changed(&mut self, group: &Group) {
        (**self).group_standby_changed(group)
    }

    fn group_source_index_changed(&mut self, group: &Group) {
        (**self).group_source_index_changed(group)
    }

    fn group_source_list_changed(&mut self, group: &Group) {
        (**self).group_source_list_changed(group)
    }

    fn group_removed(&mut self, group: &Group) {
        (**self).group_removed(group)
    }
}
