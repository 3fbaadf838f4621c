//! UPnP device descriptor (`/smp_2_` on the camera).

use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Serialize;

use super::DlnaError;
use super::xml::local_name;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    pub service_type: String,
    pub service_id: String,
    pub control_url: String,
    pub event_sub_url: String,
    pub scpd_url: String,
}

impl ServiceDescriptor {
    fn set_field(&mut self, element: &str, value: String) {
        match element {
            "serviceType" => self.service_type = value,
            "serviceId" => self.service_id = value,
            "controlURL" => self.control_url = value,
            "eventSubURL" => self.event_sub_url = value,
            "SCPDURL" => self.scpd_url = value,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescription {
    pub friendly_name: String,
    pub manufacturer: String,
    pub model_name: String,
    pub serial_number: String,
    pub services: Vec<ServiceDescriptor>,
}

impl DeviceDescription {
    /// Parses the descriptor. Device fields take the first value seen, so an
    /// embedded sub-device doesn't override the root device.
    pub fn parse(xml: &str) -> Result<Self, DlnaError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut description = Self::default();
        let mut service: Option<ServiceDescriptor> = None;
        let mut element = String::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    element = local_name(&e);
                    if element == "service" {
                        service = Some(ServiceDescriptor::default());
                    }
                }
                Event::Text(t) => {
                    let value = t.unescape()?.trim().to_string();
                    match service.as_mut() {
                        Some(service) => service.set_field(&element, value),
                        None => description.set_device_field(&element, value),
                    }
                }
                Event::End(e) => {
                    if e.local_name().as_ref() == b"service" {
                        if let Some(done) = service.take() {
                            description.services.push(done);
                        }
                    }
                    element.clear();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(description)
    }

    fn set_device_field(&mut self, element: &str, value: String) {
        let slot = match element {
            "friendlyName" => &mut self.friendly_name,
            "manufacturer" => &mut self.manufacturer,
            "modelName" => &mut self.model_name,
            "serialNumber" => &mut self.serial_number,
            _ => return,
        };
        if slot.is_empty() {
            *slot = value;
        }
    }

    /// Control URL of the ContentDirectory service, if the descriptor lists one.
    pub fn content_directory_control_url(&self) -> Option<&str> {
        self.services
            .iter()
            .find(|s| s.service_type.contains("ContentDirectory"))
            .map(|s| s.control_url.as_str())
            .filter(|url| !url.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>
    <friendlyName>[Camera]NX300</friendlyName>
    <manufacturer>Samsung Electronics</manufacturer>
    <modelName>NX300</modelName>
    <serialNumber>A1B2C3</serialNumber>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:ConnectionManager:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:ConnectionManager</serviceId>
        <controlURL>/smp_3_</controlURL>
        <eventSubURL>/smp_3_e</eventSubURL>
        <SCPDURL>/smpcm.xml</SCPDURL>
      </service>
      <service>
        <serviceType>urn:schemas-upnp-org:service:ContentDirectory:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:ContentDirectory</serviceId>
        <controlURL>/smp_4_</controlURL>
        <eventSubURL>/smp_5_</eventSubURL>
        <SCPDURL>/smpcd.xml</SCPDURL>
      </service>
    </serviceList>
  </device>
</root>"#;

    #[test]
    fn test_parse_device_and_services() {
        let description = DeviceDescription::parse(DESCRIPTOR).unwrap();
        assert_eq!(description.friendly_name, "[Camera]NX300");
        assert_eq!(description.manufacturer, "Samsung Electronics");
        assert_eq!(description.model_name, "NX300");
        assert_eq!(description.serial_number, "A1B2C3");
        assert_eq!(description.services.len(), 2);
        assert_eq!(description.services[0].scpd_url, "/smpcm.xml");
        assert_eq!(description.services[1].event_sub_url, "/smp_5_");
        assert_eq!(description.content_directory_control_url(), Some("/smp_4_"));
    }

    #[test]
    fn test_missing_content_directory() {
        let xml = "<root><device><friendlyName>Cam</friendlyName></device></root>";
        let description = DeviceDescription::parse(xml).unwrap();
        assert_eq!(description.friendly_name, "Cam");
        assert_eq!(description.content_directory_control_url(), None);
    }

    #[test]
    fn test_malformed_descriptor_is_error() {
        assert!(DeviceDescription::parse("<root><device></root>").is_err());
    }
}
