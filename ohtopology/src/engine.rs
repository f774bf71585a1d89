//! Top-level orchestration: discovery in, groups and notifications out

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ohtopology_discovery::{Device, DeviceEvent, DeviceKind, DeviceList, DeviceSink, ModeratedDeviceList};

use crate::adapter::{DeviceAdapter, MediaRendererAdapter, ProductAdapter};
use crate::config::TopologyConfig;
use crate::error::Result;
use crate::handler::TopologyHandler;
use crate::job_queue::JobQueue;
use crate::proxy::ProxyFactory;

/// Tracks every renderer the device list reports and delivers group
/// notifications to one listener.
///
/// Dropping the engine shuts it down; see [`Engine::shutdown`].
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: TopologyConfig,
    devices: Arc<dyn DeviceList>,
    proxies: Arc<dyn ProxyFactory>,
    queue: Arc<JobQueue>,
    adapters: DashMap<String, Arc<dyn DeviceAdapter>>,
    running: AtomicBool,
}

impl Engine {
    /// Start an engine with the default configuration.
    pub fn new<H>(
        devices: Arc<dyn DeviceList>,
        proxies: Arc<dyn ProxyFactory>,
        listener: H,
    ) -> Result<Self>
    where
        H: TopologyHandler + 'static,
    {
        Self::with_config(TopologyConfig::default(), devices, proxies, listener)
    }

    /// Start an engine.
    ///
    /// Spawns the dispatch thread, then starts `devices`. Devices it already
    /// knows are announced straight away.
    pub fn with_config<H>(
        config: TopologyConfig,
        devices: Arc<dyn DeviceList>,
        proxies: Arc<dyn ProxyFactory>,
        listener: H,
    ) -> Result<Self>
    where
        H: TopologyHandler + 'static,
    {
        let queue = Arc::new(JobQueue::new(
            config.job_capacity(),
            &config.dispatch_thread_name,
            listener,
        )?);

        let devices: Arc<dyn DeviceList> = if config.moderate_refresh {
            Arc::new(ModeratedDeviceList::new(devices, config.refresh_moderation))
        } else {
            devices
        };

        let inner = Arc::new(EngineInner {
            config,
            devices,
            proxies,
            queue,
            adapters: DashMap::new(),
            running: AtomicBool::new(true),
        });

        let engine: Weak<EngineInner> = Arc::downgrade(&inner);
        let sink: DeviceSink = Arc::new(move |event| {
            if let Some(engine) = engine.upgrade() {
                engine.device_event(event);
            }
        });
        inner.devices.start(sink);

        tracing::info!(
            "Topology engine started ({} jobs, moderated refresh: {})",
            inner.config.job_capacity(),
            inner.config.moderate_refresh
        );
        Ok(Self { inner })
    }

    /// Ask the device list to re-announce everything. Devices already
    /// tracked are not duplicated.
    pub fn refresh(&self) {
        if self.inner.is_running() {
            tracing::debug!("Refreshing device list");
            self.inner.devices.refresh();
        }
    }

    /// Devices currently tracked, with or without a published group.
    pub fn device_count(&self) -> usize {
        self.inner.adapters.len()
    }

    /// Groups announced and not yet removed.
    pub fn group_count(&self) -> usize {
        self.inner
            .adapters
            .iter()
            .filter(|entry| entry.value().is_active())
            .count()
    }

    pub fn config(&self) -> &TopologyConfig {
        &self.inner.config
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Stop the engine.
    ///
    /// Discovery is stopped, every adapter is detached without a
    /// `group_removed` notification, notifications already queued are
    /// delivered, and the dispatch thread is joined. Every group is released
    /// once the listener drops any clones it kept. Later calls do nothing.
    ///
    /// From inside a listener callback the dispatch thread cannot be joined;
    /// it stops after the current callback and the rest of the queue is
    /// discarded.
    pub fn shutdown(&self) -> Result<()> {
        self.inner.shutdown()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.inner.shutdown() {
            tracing::warn!("Topology engine shutdown failed: {}", e);
        }
    }
}

impl EngineInner {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn device_event(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Appeared(device) => self.product_added(device),
            DeviceEvent::Disappeared(device) => self.product_removed(&device),
        }
    }

    fn product_added(&self, device: Device) {
        if !self.is_running() {
            return;
        }
        if self.adapters.contains_key(&device.udn) {
            tracing::debug!("{} already tracked", device.udn);
            return;
        }

        tracing::debug!("Device added: {} ({:?})", device.udn, device.kind);
        let udn = device.udn.clone();
        let adapter: Arc<dyn DeviceAdapter> = match device.kind {
            DeviceKind::Product => match self.proxies.product_proxy(&device) {
                Ok(proxy) => ProductAdapter::new(device, proxy, Arc::clone(&self.queue)),
                Err(e) => {
                    tracing::warn!("No Product proxy for {}: {}", udn, e);
                    return;
                }
            },
            DeviceKind::MediaRenderer => MediaRendererAdapter::new(device, Arc::clone(&self.queue)),
        };

        match self.adapters.entry(udn.clone()) {
            Entry::Occupied(entry) => {
                tracing::debug!("{} added concurrently", entry.key());
                return;
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&adapter));
            }
        }

        // Shutdown may have collected the adapters while the proxy was built
        if !self.is_running() {
            tracing::debug!("{} arrived during shutdown; discarded", udn);
            self.adapters.remove(&udn);
            adapter.detach();
            return;
        }
        adapter.start();
    }

    fn product_removed(&self, device: &Device) {
        match self.adapters.remove(&device.udn) {
            Some((_, adapter)) => {
                tracing::debug!("Device removed: {}", device.udn);
                adapter.remove();
            }
            None => tracing::debug!("Removal of untracked device {}", device.udn),
        }
    }

    fn shutdown(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::info!("Topology engine shutting down");

        self.devices.stop();

        let udns: Vec<String> = self.adapters.iter().map(|entry| entry.key().clone()).collect();
        let adapters: Vec<Arc<dyn DeviceAdapter>> = udns
            .iter()
            .filter_map(|udn| self.adapters.remove(udn).map(|(_, adapter)| adapter))
            .collect();
        for adapter in &adapters {
            tracing::trace!("Detaching {}", adapter.device().udn);
            adapter.detach();
        }

        self.queue.shutdown()?;
        drop(adapters);

        tracing::info!("Topology engine stopped");
        Ok(())
    }
}
