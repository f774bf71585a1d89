//! Boundary to a device's Product control surface.
//!
//! The wire-level machinery (SOAP actions, GENA subscriptions) lives outside
//! this crate. It is reached through [`ProductProxy`], one per device, created
//! by the host-supplied [`ProxyFactory`].

use std::sync::Arc;

use ohtopology_discovery::Device;
use thiserror::Error;

/// Errors reported by a device proxy
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// The evented property has not been received yet
    #[error("Property {0} not available")]
    PropertyUnavailable(&'static str),

    /// The subscription could not be established
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    /// An action invocation failed or the device did not answer
    #[error("Invocation failed: {0}")]
    InvocationFailed(String),

    /// The device went away while a call was outstanding
    #[error("Device unreachable: {0}")]
    DeviceUnreachable(String),
}

/// Property-change notifications raised by a Product subscription.
///
/// Events carry no payload; the new value is read back from the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProductEvent {
    /// All properties have been received for the first time
    Initial,
    RoomChanged,
    NameChanged,
    StandbyChanged,
    SourceIndexChanged,
    SourceListChanged,
}

/// Receives subscription events. Called on transport threads.
pub type ProductEventSink = Arc<dyn Fn(ProductEvent) + Send + Sync>;

/// Completion of an asynchronous action. Invoked exactly once.
pub type InvocationCallback = Box<dyn FnOnce(Result<(), ProxyError>) + Send>;

/// Stateful proxy for one device's `av.openhome.org` Product service.
pub trait ProductProxy: Send + Sync {
    /// Start the subscription; events flow to `sink` until `unsubscribe`.
    fn subscribe(&self, sink: ProductEventSink) -> Result<(), ProxyError>;

    fn unsubscribe(&self);

    fn room(&self) -> Result<String, ProxyError>;

    fn name(&self) -> Result<String, ProxyError>;

    fn standby(&self) -> Result<bool, ProxyError>;

    fn source_index(&self) -> Result<u32, ProxyError>;

    /// Raw `SourceXml` document
    fn source_xml(&self) -> Result<String, ProxyError>;

    /// Raw `Attributes` token list
    fn attributes(&self) -> Result<String, ProxyError>;

    fn invoke_set_source_index(&self, index: u32, callback: InvocationCallback);

    fn invoke_set_standby(&self, value: bool, callback: InvocationCallback);
}

/// Creates proxies for newly discovered Product devices.
pub trait ProxyFactory: Send + Sync {
    fn product_proxy(&self, device: &Device) -> Result<Arc<dyn ProductProxy>, ProxyError>;
}
