//! DLNA/SOAP client for the camera's "MobileLink" pull mode.

use log::{debug, info, warn};
use reqwest::StatusCode;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::browse::browse_tree;
use super::capabilities::CameraCapabilities;
use super::descriptor::DeviceDescription;
use super::didl::{self, DidlEntry, MediaItem};
use super::soap::{SoapEndpoint, decode_body, resolve_url};
use super::xml::{element_text, leaf_values};
use super::{DEFAULT_CONTROL_PATH, DESCRIPTOR_PATH, DlnaError, REGISTRATION_ACTIONS, ROOT_CONTAINER};
use crate::config::CamlinkConfig;
use crate::log_buffer::{LogBuffer, LogEntry};
use crate::types::CameraFile;

/// Children requested per Browse call.
const BROWSE_PAGE: u32 = 100;

struct Connection {
    host: String,
    base_url: String,
    endpoint: SoapEndpoint,
    description: DeviceDescription,
    capabilities: Option<CameraCapabilities>,
    heartbeat: JoinHandle<()>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.heartbeat.abort();
    }
}

pub struct DlnaClient {
    http: reqwest::Client,
    /// Cap on one whole descriptor or SOAP exchange. Downloads have none.
    request_timeout: Duration,
    client_name: String,
    stream_port: u16,
    heartbeat_interval: Duration,
    browse_throttle: Duration,
    max_browse_depth: usize,
    connection: Option<Connection>,
    log: LogBuffer,
}

impl DlnaClient {
    pub fn new(config: &CamlinkConfig) -> Result<Self, DlnaError> {
        // Only idle limits on the client: a large photo over camera Wi-Fi may take
        // far longer than any fixed total, as long as bytes keep arriving.
        let http = reqwest::Client::builder()
            .connect_timeout(config.http_timeout)
            .read_timeout(config.http_timeout)
            .build()
            .map_err(|e| DlnaError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            request_timeout: config.http_timeout,
            client_name: config.client_name.clone(),
            stream_port: config.dlna_stream_port,
            heartbeat_interval: config.heartbeat_interval,
            browse_throttle: config.browse_throttle,
            max_browse_depth: config.max_browse_depth,
            connection: None,
            log: LogBuffer::new("dlna", config.log_capacity),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn description(&self) -> Option<&DeviceDescription> {
        self.connection.as_ref().map(|c| &c.description)
    }

    /// Capabilities from `GetInformation`, if the camera answered it.
    pub fn capabilities(&self) -> Option<&CameraCapabilities> {
        self.connection.as_ref().and_then(|c| c.capabilities.as_ref())
    }

    /// The ContentDirectory control URL in use.
    pub fn control_url(&self) -> Option<&str> {
        self.connection.as_ref().map(|c| c.endpoint.control_url())
    }

    /// Stream URLs the camera announced, or its default stream port.
    pub fn stream_urls(&self) -> Vec<String> {
        let Some(connection) = &self.connection else {
            return Vec::new();
        };
        match &connection.capabilities {
            Some(caps) if !caps.stream_urls.is_empty() => caps.stream_urls.clone(),
            _ => vec![format!("http://{}:{}/", connection.host, self.stream_port)],
        }
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.log.snapshot()
    }

    pub fn log_buffer(&self) -> &LogBuffer {
        &self.log
    }

    /// Fetches the descriptor, resolves the ContentDirectory control URL, reads
    /// capabilities, registers as a client and starts the heartbeat.
    ///
    /// Only the descriptor fetch is fatal; the later steps are best effort.
    pub async fn connect(&mut self, host: &str, port: u16) -> Result<DeviceDescription, DlnaError> {
        self.disconnect();
        let base_url = format!("http://{host}:{port}");
        self.log.info(format!("Connecting to {base_url}"));

        let descriptor = self.fetch_text(&format!("{base_url}{DESCRIPTOR_PATH}")).await?;
        let description = match DeviceDescription::parse(&descriptor) {
            Ok(description) => description,
            Err(e) => {
                self.log.error(format!("Descriptor parse failed, using defaults: {e}"));
                DeviceDescription::default()
            }
        };

        let control_path = description
            .content_directory_control_url()
            .unwrap_or(DEFAULT_CONTROL_PATH)
            .to_string();
        let endpoint = SoapEndpoint::new(
            self.http.clone(),
            resolve_url(&base_url, &control_path),
            self.request_timeout,
            self.log.clone(),
        );
        debug!("DLNA control URL: {}", endpoint.control_url());

        let capabilities = match endpoint.call("GetInformation", &[]).await {
            Ok(body) => match CameraCapabilities::parse(&body) {
                Ok(capabilities) => Some(capabilities),
                Err(e) => {
                    warn!("DLNA GetInformation unparsable: {e}");
                    None
                }
            },
            Err(e) => {
                self.log.error(format!("GetInformation failed (ignored): {e}"));
                None
            }
        };

        self.register(&endpoint).await;
        let heartbeat = spawn_heartbeat(endpoint.clone(), self.heartbeat_interval);

        info!(
            "DLNA connected to {} ({} {})",
            description.friendly_name, description.manufacturer, description.model_name
        );
        self.log.info(format!("Connected to {}", description.friendly_name));
        self.connection = Some(Connection {
            host: host.to_string(),
            base_url,
            endpoint,
            description: description.clone(),
            capabilities,
            heartbeat,
        });
        Ok(description)
    }

    /// Tries each vendor registration action until one gets HTTP 200.
    async fn register(&self, endpoint: &SoapEndpoint) {
        let args = [("ClientName", self.client_name.clone()), ("ClientID", self.client_name.clone())];
        for action in REGISTRATION_ACTIONS {
            match endpoint.call(action, &args).await {
                Ok(_) => {
                    self.log.info(format!("Registered with {action}"));
                    return;
                }
                Err(e) => debug!("DLNA {action} failed: {e}"),
            }
        }
        self.log.error("No registration action accepted (continuing)");
    }

    /// Stops the heartbeat and forgets the camera. Idempotent.
    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            self.log.info("Disconnected");
        }
    }

    fn endpoint(&self) -> Result<&SoapEndpoint, DlnaError> {
        self.connection.as_ref().map(|c| &c.endpoint).ok_or(DlnaError::NotConnected)
    }

    /// One page of direct children.
    pub async fn browse(&self, container_id: &str, start: u32, count: u32) -> Result<Vec<DidlEntry>, DlnaError> {
        browse_page(self.endpoint()?, container_id, start, count).await
    }

    /// Every item below `container_id`, recursively.
    pub async fn browse_all(&self, container_id: &str) -> Result<Vec<MediaItem>, DlnaError> {
        let endpoint = self.endpoint()?.clone();
        let items = browse_tree(container_id, self.max_browse_depth, self.browse_throttle, move |id| {
            let endpoint = endpoint.clone();
            async move { browse_page(&endpoint, &id, 0, BROWSE_PAGE).await }
        })
        .await?;
        self.log.info(format!("Browsed {} items below {container_id}", items.len()));
        Ok(items)
    }

    pub async fn list_files(&self) -> Result<Vec<CameraFile>, DlnaError> {
        let items = self.browse_all(ROOT_CONTAINER).await?;
        Ok(items.iter().map(MediaItem::to_camera_file).collect())
    }

    /// Plain GET of a content URL. Relative URLs resolve against the camera.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, DlnaError> {
        let url = match &self.connection {
            Some(connection) => resolve_url(&connection.base_url, url),
            None => url.to_string(),
        };
        self.log.sent(format!("GET {url}"));
        let response = self.http.get(&url).send().await?;
        if response.status() != StatusCode::OK {
            self.log.error(format!("GET {url} -> HTTP {}", response.status().as_u16()));
            return Err(DlnaError::HttpStatus(response.status().as_u16()));
        }
        let bytes = response.bytes().await?;
        self.log.received(format!("{} bytes", bytes.len()));
        Ok(bytes.to_vec())
    }

    /// Thumbnail bytes, or `None` when the listing advertised no thumbnail.
    pub async fn download_thumbnail(&self, file: &CameraFile) -> Result<Option<Vec<u8>>, DlnaError> {
        match &file.thumbnail_url {
            Some(url) => Ok(Some(self.download(url).await?)),
            None => Ok(None),
        }
    }

    /// Remote shutter. Returns the new image URL when the camera reports one.
    pub async fn capture_image(&self) -> Result<Option<String>, DlnaError> {
        let body = self.endpoint()?.call("X_CaptureImage", &[]).await?;
        Ok(leaf_values(&body)?
            .into_iter()
            .map(|(_, value)| value)
            .find(|value| value.starts_with("http://") || value.starts_with("https://")))
    }

    /// Raw `GetDeviceConfiguration` values as `(element, text)` pairs.
    pub async fn device_configuration(&self) -> Result<Vec<(String, String)>, DlnaError> {
        let body = self.endpoint()?.call("GetDeviceConfiguration", &[]).await?;
        leaf_values(&body)
    }

    async fn fetch_text(&self, url: &str) -> Result<String, DlnaError> {
        self.log.sent(format!("GET {url}"));
        let response = self.http.get(url).timeout(self.request_timeout).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if status != StatusCode::OK {
            self.log.error(format!("GET {url} -> HTTP {}", status.as_u16()));
            return Err(DlnaError::HttpStatus(status.as_u16()));
        }
        Ok(decode_body(&bytes))
    }
}

async fn browse_page(endpoint: &SoapEndpoint, container_id: &str, start: u32, count: u32) -> Result<Vec<DidlEntry>, DlnaError> {
    let args = [
        ("ObjectID", container_id.to_string()),
        ("BrowseFlag", "BrowseDirectChildren".to_string()),
        ("Filter", "*".to_string()),
        ("StartingIndex", start.to_string()),
        ("RequestedCount", count.to_string()),
        ("SortCriteria", String::new()),
    ];
    let body = endpoint.call("Browse", &args).await?;
    let result = element_text(&body, "Result")?.ok_or(DlnaError::MissingResult)?;
    didl::parse(&result)
}

/// Browses the root with count 1 every `interval` so the camera keeps the
/// client registered. Failures are logged only.
fn spawn_heartbeat(endpoint: SoapEndpoint, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(100)));
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = browse_page(&endpoint, ROOT_CONTAINER, 0, 1).await {
                warn!("DLNA heartbeat failed: {e}");
            }
        }
    })
}
