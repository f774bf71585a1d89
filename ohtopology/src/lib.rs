//! OpenHome Topology
//!
//! Aggregates the renderers on a network into one ordered stream of group
//! notifications.
//!
//! # Architecture
//!
//! ```text
//! DeviceList ──appeared/disappeared──▶ Engine ──creates/removes──▶ Adapter (one per device)
//!                                                                   │ subscribes to the device,
//!                                                                   │ mutates its Group
//!                                                                   ▼
//!                     TopologyHandler ◀──dispatch thread── JobQueue (bounded FIFO)
//! ```
//!
//! Device callbacks arrive on any number of threads. Every change an adapter
//! makes to its [`Group`] is queued, and a single dispatch thread delivers the
//! queue to the [`TopologyHandler`] in exactly the order it was filled. The
//! listener is never called concurrently and never sees a group before
//! `group_added` or after `group_removed`.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ohtopology::prelude::*;
//!
//! struct Printer;
//!
//! impl TopologyHandler for Printer {
//!     fn group_added(&mut self, group: &Group) {
//!         println!("+ {} ({} sources)", group.room(), group.source_count());
//!     }
//!     fn group_standby_changed(&mut self, group: &Group) {
//!         println!("  {} standby={}", group.room(), group.standby());
//!     }
//!     fn group_source_index_changed(&mut self, group: &Group) {
//!         println!("  {} source={}", group.room(), group.source_index());
//!     }
//!     fn group_source_list_changed(&mut self, _group: &Group) {}
//!     fn group_removed(&mut self, group: &Group) {
//!         println!("- {}", group.room());
//!     }
//! }
//!
//! ohtopology::logging::init_logging_from_env()?;
//! let engine = Engine::new(device_list, proxy_factory, Printer)?;
//! engine.refresh();
//! ```
//!
//! Network discovery and the device control protocol are supplied by the
//! host through [`DeviceList`] and [`ProxyFactory`].

mod adapter;
pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
mod job;
pub mod job_queue;
pub mod logging;
pub mod model;
pub mod proxy;

pub use config::TopologyConfig;
pub use engine::Engine;
pub use error::{Result, TopologyError};
pub use handler::TopologyHandler;
pub use job::Notification;
pub use job_queue::JobQueue;
pub use model::{Group, GroupSnapshot, Source, UserData, WeakGroup};
pub use proxy::{
    InvocationCallback, ProductEvent, ProductEventSink, ProductProxy, ProxyError, ProxyFactory,
};

pub use ohtopology_discovery::{Device, DeviceEvent, DeviceKind, DeviceList, DeviceSink};

/// Commonly used items
pub mod prelude {
    pub use crate::{
        Device, DeviceKind, DeviceList, Engine, Group, ProductProxy, ProxyFactory, Source,
        TopologyConfig, TopologyError, TopologyHandler,
    };
}
