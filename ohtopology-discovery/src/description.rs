//! Device description parsing and classification.
//!
//! Handles the UPnP device description XML fetched from a device's
//! location URL and decides which topology adapter, if any, applies.

use crate::error::{DiscoveryError, Result};
use crate::{Device, DeviceKind};
use serde::Deserialize;

const PRODUCT_SERVICE_PREFIX: &str = "urn:av-openhome-org:service:Product:";
const MEDIA_RENDERER_PREFIX: &str = "urn:schemas-upnp-org:device:MediaRenderer:";

/// UPnP device description root element.
#[derive(Debug, Deserialize)]
pub struct Root {
    pub device: DeviceDescription,
}

/// Device description parsed from XML.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescription {
    pub device_type: String,
    pub friendly_name: String,
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    #[serde(rename = "UDN")]
    pub udn: String,
    #[serde(default)]
    pub service_list: ServiceList,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceList {
    #[serde(rename = "service", default)]
    pub services: Vec<ServiceDescription>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescription {
    pub service_type: String,
    pub service_id: Option<String>,
}

impl DeviceDescription {
    /// Parse device description from XML.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError::ParseError` if the XML is malformed or missing required fields.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let root: Root = quick_xml::de::from_str(xml).map_err(|e| {
            DiscoveryError::ParseError(format!("Failed to parse device XML: {}", e))
        })?;

        Ok(root.device)
    }

    /// Whether the device hosts an OpenHome Product service.
    pub fn has_product_service(&self) -> bool {
        self.service_list
            .services
            .iter()
            .any(|s| s.service_type.starts_with(PRODUCT_SERVICE_PREFIX))
    }

    /// Classify the device. A Product service wins over the MediaRenderer
    /// device type since OpenHome products frequently advertise both.
    pub fn kind(&self) -> Option<DeviceKind> {
        if self.has_product_service() {
            Some(DeviceKind::Product)
        } else if self.device_type.starts_with(MEDIA_RENDERER_PREFIX) {
            Some(DeviceKind::MediaRenderer)
        } else {
            None
        }
    }

    /// Convert to a [`Device`] handle, or `None` if this is not a renderer.
    pub fn to_device(&self, location: &str) -> Option<Device> {
        let kind = self.kind()?;
        Some(Device {
            udn: self.udn.clone(),
            friendly_name: self.friendly_name.clone(),
            location: location.to_string(),
            kind,
        })
    }

    /// Like [`to_device`](Self::to_device) but reports why a device was rejected.
    pub fn try_to_device(&self, location: &str) -> Result<Device> {
        self.to_device(location).ok_or_else(|| {
            DiscoveryError::InvalidDevice(format!(
                "{} ({}) is not a renderer",
                self.friendly_name, self.device_type
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DS_XML: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <deviceType>urn:linn-co-uk:device:Source:1</deviceType>
    <friendlyName>Kitchen:Majik DS</friendlyName>
    <manufacturer>Linn Products Ltd.</manufacturer>
    <modelName>Majik DS</modelName>
    <UDN>uuid:4c494e4e-0026-0f21-a1b8-01303737013f</UDN>
    <serviceList>
      <service>
        <serviceType>urn:av-openhome-org:service:Product:1</serviceType>
        <serviceId>urn:av-openhome-org:serviceId:Product</serviceId>
      </service>
      <service>
        <serviceType>urn:av-openhome-org:service:Volume:1</serviceType>
        <serviceId>urn:av-openhome-org:serviceId:Volume</serviceId>
      </service>
    </serviceList>
  </device>
</root>"#;

    const RENDERER_XML: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1</deviceType>
    <friendlyName>Bedroom TV</friendlyName>
    <UDN>uuid:renderer-1</UDN>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:RenderingControl:1</serviceType>
      </service>
    </serviceList>
  </device>
</root>"#;

    #[test]
    fn test_product_device_from_xml() {
        let desc = DeviceDescription::from_xml(DS_XML).unwrap();
        assert_eq!(desc.friendly_name, "Kitchen:Majik DS");
        assert_eq!(desc.manufacturer.as_deref(), Some("Linn Products Ltd."));
        assert_eq!(desc.service_list.services.len(), 2);
        assert!(desc.has_product_service());
        assert_eq!(desc.kind(), Some(DeviceKind::Product));
    }

    #[test]
    fn test_media_renderer_classification() {
        let desc = DeviceDescription::from_xml(RENDERER_XML).unwrap();
        assert!(!desc.has_product_service());
        assert_eq!(desc.kind(), Some(DeviceKind::MediaRenderer));

        let device = desc.to_device("http://10.0.0.7:49152/desc.xml").unwrap();
        assert_eq!(device.udn, "uuid:renderer-1");
        assert_eq!(device.location, "http://10.0.0.7:49152/desc.xml");
        assert_eq!(device.kind, DeviceKind::MediaRenderer);
    }

    #[test]
    fn test_not_a_renderer() {
        let xml = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <deviceType>urn:schemas-upnp-org:device:InternetGatewayDevice:1</deviceType>
    <friendlyName>Router</friendlyName>
    <UDN>uuid:ROUTER123</UDN>
  </device>
</root>"#;

        let desc = DeviceDescription::from_xml(xml).unwrap();
        assert_eq!(desc.kind(), None);
        assert!(desc.to_device("http://10.0.0.1/").is_none());
        assert!(matches!(
            desc.try_to_device("http://10.0.0.1/"),
            Err(DiscoveryError::InvalidDevice(_))
        ));
    }

    #[test]
    fn test_missing_udn_is_parse_error() {
        let xml = r#"<root><device><deviceType>x</deviceType><friendlyName>y</friendlyName></device></root>"#;
        assert!(matches!(
            DeviceDescription::from_xml(xml),
            Err(DiscoveryError::ParseError(_))
        ));
    }
}
