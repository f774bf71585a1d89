//! Shared fakes for engine integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use ohtopology::{
    Device, DeviceEvent, DeviceKind, DeviceList, DeviceSink, Group, GroupSnapshot,
    InvocationCallback, Notification, ProductEvent, ProductEventSink, ProductProxy, ProxyError,
    ProxyFactory, TopologyHandler, WeakGroup,
};
use parking_lot::Mutex;

pub const WAIT: Duration = Duration::from_secs(5);

pub fn source_xml(sources: &[(&str, &str, bool)]) -> String {
    let mut xml = String::from("<SourceList>");
    for (name, source_type, visible) in sources {
        xml.push_str(&format!(
            "<Source><Name>{}</Name><Type>{}</Type><Visible>{}</Visible></Source>",
            name, source_type, visible
        ));
    }
    xml.push_str("</SourceList>");
    xml
}

pub fn product_device(udn: &str) -> Device {
    Device::new(udn, format!("{}:Player", udn), "http://127.0.0.1/", DeviceKind::Product)
}

/// Device list driven by the test.
#[derive(Default)]
pub struct MockDeviceList {
    sink: Mutex<Option<DeviceSink>>,
    devices: Mutex<Vec<Device>>,
    pub refreshes: AtomicUsize,
    pub stopped: AtomicBool,
}

impl MockDeviceList {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn appear(&self, device: &Device) {
        {
            let mut devices = self.devices.lock();
            if !devices.iter().any(|d| d.udn == device.udn) {
                devices.push(device.clone());
            }
        }
        self.emit(DeviceEvent::Appeared(device.clone()));
    }

    pub fn disappear(&self, device: &Device) {
        self.devices.lock().retain(|d| d.udn != device.udn);
        self.emit(DeviceEvent::Disappeared(device.clone()));
    }

    fn emit(&self, event: DeviceEvent) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink(event);
        }
    }
}

impl DeviceList for MockDeviceList {
    fn start(&self, sink: DeviceSink) {
        *self.sink.lock() = Some(sink);
    }

    fn refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let devices = self.devices.lock().clone();
        for device in devices {
            self.emit(DeviceEvent::Appeared(device));
        }
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.sink.lock().take();
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductState {
    pub room: String,
    pub name: String,
    pub standby: bool,
    pub source_index: u32,
    pub source_xml: String,
    pub attributes: String,
}

/// Product proxy whose properties and events are set by the test.
///
/// Action invocations are parked until the test completes them.
#[derive(Default)]
pub struct MockProductProxy {
    pub state: Mutex<ProductState>,
    sink: Mutex<Option<ProductEventSink>>,
    invocations: Mutex<Vec<(String, InvocationCallback)>>,
    pub unsubscribed: AtomicBool,
}

impl MockProductProxy {
    pub fn new(room: &str, sources: &[(&str, &str, bool)]) -> Arc<Self> {
        let proxy = Arc::new(Self::default());
        *proxy.state.lock() = ProductState {
            room: room.to_string(),
            name: "Player".to_string(),
            standby: false,
            source_index: 0,
            source_xml: source_xml(sources),
            attributes: "Info Time Volume".to_string(),
        };
        proxy
    }

    pub fn update(&self, f: impl FnOnce(&mut ProductState)) {
        f(&mut self.state.lock());
    }

    /// Deliver `event` on the calling thread, as a transport callback would.
    pub fn emit(&self, event: ProductEvent) {
        let sink = self.sink.lock().clone();
        if let Some(sink) = sink {
            sink(event);
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.sink.lock().is_some()
    }

    pub fn invocations(&self) -> Vec<String> {
        self.invocations.lock().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn complete_next(&self, result: Result<(), ProxyError>) {
        let (_, callback) = self.invocations.lock().remove(0);
        callback(result);
    }
}

impl ProductProxy for MockProductProxy {
    fn subscribe(&self, sink: ProductEventSink) -> Result<(), ProxyError> {
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    fn unsubscribe(&self) {
        self.unsubscribed.store(true, Ordering::SeqCst);
        self.sink.lock().take();
    }

    fn room(&self) -> Result<String, ProxyError> {
        Ok(self.state.lock().room.clone())
    }

    fn name(&self) -> Result<String, ProxyError> {
        Ok(self.state.lock().name.clone())
    }

    fn standby(&self) -> Result<bool, ProxyError> {
        Ok(self.state.lock().standby)
    }

    fn source_index(&self) -> Result<u32, ProxyError> {
        Ok(self.state.lock().source_index)
    }

    fn source_xml(&self) -> Result<String, ProxyError> {
        Ok(self.state.lock().source_xml.clone())
    }

    fn attributes(&self) -> Result<String, ProxyError> {
        Ok(self.state.lock().attributes.clone())
    }

    fn invoke_set_source_index(&self, index: u32, callback: InvocationCallback) {
        self.invocations
            .lock()
            .push((format!("SetSourceIndex({})", index), callback));
    }

    fn invoke_set_standby(&self, value: bool, callback: InvocationCallback) {
        self.invocations
            .lock()
            .push((format!("SetStandby({})", value), callback));
    }
}

/// Hands out proxies registered by UDN.
#[derive(Default)]
pub struct MockProxyFactory {
    proxies: Mutex<HashMap<String, Arc<MockProductProxy>>>,
}

impl MockProxyFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, udn: &str, proxy: Arc<MockProductProxy>) {
        self.proxies.lock().insert(udn.to_string(), proxy);
    }
}

impl ProxyFactory for MockProxyFactory {
    fn product_proxy(&self, device: &Device) -> Result<Arc<dyn ProductProxy>, ProxyError> {
        match self.proxies.lock().get(&device.udn) {
            Some(proxy) => Ok(proxy.clone() as Arc<dyn ProductProxy>),
            None => Err(ProxyError::DeviceUnreachable(device.udn.clone())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub notification: Notification,
    pub snapshot: GroupSnapshot,
    pub group: WeakGroup,
}

/// Listener forwarding every notification to the test thread.
pub struct Recorder(mpsc::Sender<Recorded>);

impl Recorder {
    fn record(&self, notification: Notification, group: &Group) {
        let _ = self.0.send(Recorded {
            notification,
            snapshot: group.snapshot(),
            group: group.downgrade(),
        });
    }
}

impl TopologyHandler for Recorder {
    fn group_added(&mut self, group: &Group) {
        self.record(Notification::Added, group);
    }

    fn group_standby_changed(&mut self, group: &Group) {
        self.record(Notification::StandbyChanged, group);
    }

    fn group_source_index_changed(&mut self, group: &Group) {
        self.record(Notification::SourceIndexChanged, group);
    }

    fn group_source_list_changed(&mut self, group: &Group) {
        self.record(Notification::SourceListChanged, group);
    }

    fn group_removed(&mut self, group: &Group) {
        self.record(Notification::Removed, group);
    }
}

pub struct Events(mpsc::Receiver<Recorded>);

impl Events {
    pub fn next(&self) -> Recorded {
        self.0.recv_timeout(WAIT).expect("expected a notification")
    }

    /// Assert nothing arrives within `wait`.
    pub fn assert_quiet(&self, wait: Duration) {
        if let Ok(unexpected) = self.0.recv_timeout(wait) {
            panic!("unexpected notification: {:?}", unexpected.notification);
        }
    }

    pub fn drain(&self) -> Vec<Recorded> {
        self.0.try_iter().collect()
    }
}

pub fn recorder() -> (Recorder, Events) {
    let (tx, rx) = mpsc::channel();
    (Recorder(tx), Events(rx))
}
