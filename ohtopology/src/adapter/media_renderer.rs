//! Adapter for plain UPnP AV renderers.
//!
//! Without a Product service there is nothing to subscribe to, so the group
//! is built straight from the device handle and never changes.

use std::sync::{Arc, Weak};

use ohtopology_discovery::Device;
use ohtopology_parser::SourceRecord;

use super::{AdapterCore, DeviceAdapter};
use crate::error::{Result, TopologyError};
use crate::job_queue::JobQueue;
use crate::model::{GroupHandler, GroupInit, GroupUpdater};

pub(crate) struct MediaRendererAdapter {
    core: AdapterCore,
    self_ref: Weak<MediaRendererAdapter>,
}

impl MediaRendererAdapter {
    pub fn new(device: Device, queue: Arc<JobQueue>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            core: AdapterCore::new(device, queue),
            self_ref: self_ref.clone(),
        })
    }
}

/// Split "Room:Name" at the first colon. Without one, both are the whole name.
fn room_and_name(friendly_name: &str) -> (&str, &str) {
    match friendly_name.split_once(':') {
        Some((room, name)) => (room, name),
        None => (friendly_name, friendly_name),
    }
}

impl DeviceAdapter for MediaRendererAdapter {
    fn device(&self) -> &Device {
        &self.core.device
    }

    fn start(&self) {
        let (room, name) = room_and_name(&self.core.device.friendly_name);
        let init = GroupInit {
            standby: false,
            room: room.to_string(),
            name: name.to_string(),
            source_index: 0,
            sources: vec![SourceRecord::new("Playback", "UpnpAv", true)],
            has_volume_control: true,
        };

        let handler: Weak<dyn GroupHandler> = self.self_ref.clone();
        let updater = GroupUpdater::new(self.core.device.clone(), handler, init);
        self.core.publish(&mut self.core.group.lock(), updater);
        self.core.flush();
    }

    fn remove(&self) {
        if self.core.begin_removal() {
            self.core.release(true);
        }
    }

    fn detach(&self) {
        if self.core.begin_removal() {
            self.core.release(false);
        }
    }

    fn is_active(&self) -> bool {
        self.core.is_active()
    }
}

impl GroupHandler for MediaRendererAdapter {
    fn set_standby(&self, _value: bool) -> Result<()> {
        self.core.ensure_active()?;
        Err(TopologyError::Unsupported {
            command: "SetStandby",
        })
    }

    fn set_source_index(&self, _index: usize) -> Result<()> {
        self.core.ensure_active()?;
        Err(TopologyError::Unsupported {
            command: "SetSourceIndex",
        })
    }
}
