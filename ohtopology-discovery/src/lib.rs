//! Discovery boundary for the OpenHome topology layer
//!
//! This crate does not find devices on the network. It defines what the
//! topology layer consumes from whatever does: a [`Device`] handle per
//! renderer, [`DeviceEvent`]s announcing appearance and disappearance, and the
//! [`DeviceList`] collaborator that produces them and can be asked to
//! re-announce everything it knows.
//!
//! [`ModeratedDeviceList`] wraps any `DeviceList` to suppress duplicate
//! announcements and to ride out the burst of spurious removals some
//! platforms report while a refresh is in progress.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ohtopology_discovery::{DeviceEvent, DeviceList, ModeratedDeviceList};
//!
//! let list = ModeratedDeviceList::new(Arc::new(my_ssdp_list), Duration::from_secs(180));
//! list.start(Arc::new(|event| match event {
//!     DeviceEvent::Appeared(device) => println!("+ {}", device.friendly_name),
//!     DeviceEvent::Disappeared(device) => println!("- {}", device.friendly_name),
//! }));
//! list.refresh();
//! ```

pub mod description;
mod error;
mod moderated;

use std::sync::Arc;

pub use description::DeviceDescription;
pub use error::{DiscoveryError, Result};
pub use moderated::ModeratedDeviceList;

/// Which control surface a renderer exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// OpenHome device hosting the `av.openhome.org` Product service
    Product,
    /// Plain UPnP AV MediaRenderer without a Product service
    MediaRenderer,
}

/// Handle to a discovered renderer.
///
/// Handles are unique per physical device for as long as it is present;
/// `udn` is the identity used everywhere in this workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Unique device name, e.g. "uuid:4c494e4e-0026-0f21-a1b8-01303737013f"
    pub udn: String,
    /// Friendly name from the device description
    pub friendly_name: String,
    /// URL of the device description
    pub location: String,
    pub kind: DeviceKind,
}

impl Device {
    pub fn new(
        udn: impl Into<String>,
        friendly_name: impl Into<String>,
        location: impl Into<String>,
        kind: DeviceKind,
    ) -> Self {
        Self {
            udn: udn.into(),
            friendly_name: friendly_name.into(),
            location: location.into(),
            kind,
        }
    }

    /// Build a handle from a parsed device description.
    ///
    /// Returns `None` for devices that are not renderers.
    pub fn from_description(description: &DeviceDescription, location: &str) -> Option<Self> {
        description.to_device(location)
    }
}

/// Events produced by a [`DeviceList`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Appeared(Device),
    Disappeared(Device),
}

impl DeviceEvent {
    pub fn device(&self) -> &Device {
        match self {
            DeviceEvent::Appeared(d) | DeviceEvent::Disappeared(d) => d,
        }
    }
}

/// Callback receiving device events. May be invoked from any thread.
pub type DeviceSink = Arc<dyn Fn(DeviceEvent) + Send + Sync>;

/// The discovery collaborator.
///
/// Implementations report every appearance once and eventually report a
/// disappearance for every appearance.
pub trait DeviceList: Send + Sync {
    /// Begin delivering events to `sink`.
    fn start(&self, sink: DeviceSink);

    /// Ask the network to re-announce all devices.
    fn refresh(&self);

    /// Stop delivering events. Events raised after this returns are dropped.
    fn stop(&self) {}
}
