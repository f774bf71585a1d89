//! Adapter for OpenHome Product devices

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use ohtopology_discovery::Device;
use ohtopology_parser::{parse_source_list, ProductAttributes};
use parking_lot::Mutex;

use super::{AdapterCore, DeviceAdapter, Phase};
use crate::error::{Result, TopologyError};
use crate::job::Notification;
use crate::job_queue::JobQueue;
use crate::model::{GroupHandler, GroupInit, GroupUpdater};
use crate::proxy::{InvocationCallback, ProductEvent, ProductEventSink, ProductProxy, ProxyError};

#[derive(Debug, Clone, Copy)]
enum Command {
    SetStandby,
    SetSourceIndex,
}

impl Command {
    fn name(self) -> &'static str {
        match self {
            Command::SetStandby => "SetStandby",
            Command::SetSourceIndex => "SetSourceIndex",
        }
    }
}

/// Mirrors one Product service into a group.
pub(crate) struct ProductAdapter {
    core: AdapterCore,
    proxy: Arc<dyn ProductProxy>,
    self_ref: Weak<ProductAdapter>,
    /// Serializes subscribe against unsubscribe
    lifecycle: Mutex<()>,
    standby_pending: AtomicBool,
    source_index_pending: AtomicBool,
}

impl ProductAdapter {
    pub fn new(device: Device, proxy: Arc<dyn ProductProxy>, queue: Arc<JobQueue>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            core: AdapterCore::new(device, queue),
            proxy,
            self_ref: self_ref.clone(),
            lifecycle: Mutex::new(()),
            standby_pending: AtomicBool::new(false),
            source_index_pending: AtomicBool::new(false),
        })
    }

    fn handle_event(&self, event: ProductEvent) {
        let mut slot = self.core.group.lock();
        let result = match self.core.phase() {
            Phase::Subscribing => self.initialise(&mut slot),
            Phase::Active => match slot.as_ref() {
                Some(updater) => self.apply(updater, event),
                None => Ok(()),
            },
            Phase::Removing | Phase::Detached => {
                tracing::trace!("{:?} for {} after removal", event, self.core.device.udn);
                Ok(())
            }
        };
        drop(slot);
        self.core.flush();

        if let Err(e) = result {
            tracing::warn!(
                "Ignoring {:?} from {}: {}",
                event,
                self.core.device.udn,
                e
            );
        }
    }

    /// Read the full state and publish the group. On failure the adapter
    /// stays `Subscribing` and the next event tries again.
    fn initialise(&self, slot: &mut Option<GroupUpdater>) -> Result<()> {
        let init = self.read_state()?;
        let handler: Weak<dyn GroupHandler> = self.self_ref.clone();
        let updater = GroupUpdater::new(self.core.device.clone(), handler, init);
        self.core.publish(slot, updater);
        Ok(())
    }

    /// Full device state. An index past the end of the list is pulled back
    /// to the last source.
    fn read_state(&self) -> Result<GroupInit> {
        let sources = parse_source_list(&self.proxy.source_xml()?)?;
        let attributes = ProductAttributes::parse(&self.proxy.attributes()?);
        let mut source_index = self.proxy.source_index()? as usize;
        if source_index >= sources.len() && !(sources.is_empty() && source_index == 0) {
            tracing::warn!(
                "{} reported source index {} with {} sources; clamping",
                self.core.device.udn,
                source_index,
                sources.len()
            );
            source_index = sources.len().saturating_sub(1);
        }

        Ok(GroupInit {
            standby: self.proxy.standby()?,
            room: self.proxy.room()?,
            name: self.proxy.name()?,
            source_index,
            sources,
            has_volume_control: attributes.has_volume_control(),
        })
    }

    fn apply(&self, updater: &GroupUpdater, event: ProductEvent) -> Result<()> {
        match event {
            ProductEvent::RoomChanged => updater.update_room(&self.proxy.room()?),
            ProductEvent::NameChanged => updater.update_name(&self.proxy.name()?),
            ProductEvent::StandbyChanged => {
                updater.update_standby(self.proxy.standby()?);
                self.core.notify(updater, Notification::StandbyChanged);
            }
            ProductEvent::SourceIndexChanged => {
                updater.update_source_index(self.proxy.source_index()? as usize)?;
                self.core.notify(updater, Notification::SourceIndexChanged);
            }
            ProductEvent::SourceListChanged => {
                let records = parse_source_list(&self.proxy.source_xml()?)?;
                updater.replace_sources(&records);
                self.core.notify(updater, Notification::SourceListChanged);
            }
            ProductEvent::Initial => self.resync(updater)?,
        }
        Ok(())
    }

    /// A repeated initial event: take everything again, notify only what moved.
    fn resync(&self, updater: &GroupUpdater) -> Result<()> {
        let state = self.read_state()?;
        let index_before = updater.group().source_index();

        updater.update_room(&state.room);
        updater.update_name(&state.name);
        if updater.update_standby(state.standby) {
            self.core.notify(updater, Notification::StandbyChanged);
        }
        if updater.replace_sources(&state.sources) {
            self.core.notify(updater, Notification::SourceListChanged);
        }
        // Replacing the list may already have moved a stranded index
        updater.update_source_index(state.source_index)?;
        if state.source_index != index_before {
            self.core.notify(updater, Notification::SourceIndexChanged);
        }
        Ok(())
    }

    fn pending_flag(&self, command: Command) -> &AtomicBool {
        match command {
            Command::SetStandby => &self.standby_pending,
            Command::SetSourceIndex => &self.source_index_pending,
        }
    }

    /// Start `command` unless one of its kind is still outstanding.
    fn invoke(
        &self,
        command: Command,
        call: impl FnOnce(&dyn ProductProxy, InvocationCallback),
    ) -> Result<()> {
        self.core.ensure_active()?;
        if self
            .pending_flag(command)
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TopologyError::CommandPending {
                command: command.name(),
            });
        }

        tracing::debug!("{} on {}", command.name(), self.core.device.udn);
        let adapter = self.self_ref.clone();
        call(
            self.proxy.as_ref(),
            Box::new(move |result| {
                if let Some(adapter) = adapter.upgrade() {
                    adapter.command_finished(command, result);
                }
            }),
        );
        Ok(())
    }

    fn command_finished(&self, command: Command, result: std::result::Result<(), ProxyError>) {
        self.pending_flag(command).store(false, Ordering::Release);
        match result {
            Ok(()) => tracing::debug!("{} on {} completed", command.name(), self.core.device.udn),
            Err(e) => tracing::warn!(
                "{} on {} failed: {}",
                command.name(),
                self.core.device.udn,
                e
            ),
        }
    }

    fn stop(&self, notify: bool) {
        {
            let _lifecycle = self.lifecycle.lock();
            if !self.core.begin_removal() {
                return;
            }
            self.proxy.unsubscribe();
        }
        self.core.release(notify);
    }
}

impl DeviceAdapter for ProductAdapter {
    fn device(&self) -> &Device {
        &self.core.device
    }

    fn start(&self) {
        let _lifecycle = self.lifecycle.lock();
        if self.core.phase() != Phase::Subscribing {
            return;
        }

        let adapter = self.self_ref.clone();
        let sink: ProductEventSink = Arc::new(move |event| {
            if let Some(adapter) = adapter.upgrade() {
                adapter.handle_event(event);
            }
        });

        match self.proxy.subscribe(sink) {
            Ok(()) => tracing::debug!("Subscribed to {}", self.core.device.udn),
            Err(e) => tracing::warn!("Subscription to {} failed: {}", self.core.device.udn, e),
        }
    }

    fn remove(&self) {
        self.stop(true);
    }

    fn detach(&self) {
        self.stop(false);
    }

    fn is_active(&self) -> bool {
        self.core.is_active()
    }
}

impl Drop for ProductAdapter {
    fn drop(&mut self) {
        // Dropped without remove/detach, e.g. when the engine gave it up
        if self.core.begin_removal() {
            self.proxy.unsubscribe();
        }
    }
}

impl GroupHandler for ProductAdapter {
    fn set_standby(&self, value: bool) -> Result<()> {
        self.invoke(Command::SetStandby, |proxy, done| {
            proxy.invoke_set_standby(value, done)
        })
    }

    fn set_source_index(&self, index: usize) -> Result<()> {
        let index = u32::try_from(index).map_err(|_| TopologyError::InvalidSourceIndex {
            index,
            count: u32::MAX as usize,
        })?;
        self.invoke(Command::SetSourceIndex, |proxy, done| {
            proxy.invoke_set_source_index(index, done)
        })
    }
}
