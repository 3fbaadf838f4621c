//! The camera's DLNA/UPnP dialect ("MobileLink"): HTTP + SOAP + DIDL-Lite.
//!
//! - `descriptor`: the UPnP device descriptor and its service list
//! - `soap`: envelope builder, body decoding and the SOAP endpoint
//! - `didl`: DIDL-Lite listings returned by Browse
//! - `browse`: recursive container traversal with cycle and depth guards
//! - `capabilities`: vendor `GetInformation` fields
//! - `client`: connect sequence, heartbeat, listing and downloads

mod browse;
mod capabilities;
mod client;
mod descriptor;
mod didl;
mod errors;
mod soap;
mod xml;

#[cfg(test)]
pub(crate) mod fake_camera;

pub use browse::browse_tree;
pub use capabilities::CameraCapabilities;
pub use client::DlnaClient;
pub use descriptor::{DeviceDescription, ServiceDescriptor};
pub use didl::{DidlEntry, MediaItem, Resource};
pub use errors::DlnaError;
pub use soap::{build_envelope, decode_body};

/// UPnP ContentDirectory namespace used for every SOAP action.
pub const CONTENT_DIRECTORY_NS: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";

/// Where the camera serves its device descriptor.
pub const DESCRIPTOR_PATH: &str = "/smp_2_";

/// ContentDirectory control path when the descriptor doesn't name one.
pub const DEFAULT_CONTROL_PATH: &str = "/smp_4_";

/// Vendor client-registration actions, tried in order until one gets HTTP 200.
pub const REGISTRATION_ACTIONS: [&str; 3] = ["X_RegisterClient", "X_SetClientInfo", "X_ConnectClient"];

/// Object id of the ContentDirectory root.
pub const ROOT_CONTAINER: &str = "0";
