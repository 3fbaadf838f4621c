//! In-process DLNA camera (axum) for tests.
//!
//! Content tree, with two deliberate cycles:
//!
//! ```text
//! 0      -> container PHOTO, item 100 (SAM_0001.JPG), container 0
//! PHOTO  -> item 101 (SAM_0002.MP4), container PHOTO
//! ```

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::{get, post};
use quick_xml::escape::escape;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use super::CONTENT_DIRECTORY_NS;

pub(crate) const JPEG_BYTES: &[u8] = b"full-size-jpeg";
pub(crate) const THUMB_BYTES: &[u8] = b"thumb";
pub(crate) const VIDEO_BYTES: &[u8] = b"video-bytes";

/// `/slow/steady` sends this many chunks of `SLOW_CHUNK_LEN` bytes, one per `SLOW_CHUNK_PAUSE`.
pub(crate) const SLOW_CHUNKS: usize = 30;
pub(crate) const SLOW_CHUNK_LEN: usize = 100;
pub(crate) const SLOW_CHUNK_PAUSE: Duration = Duration::from_millis(50);
/// `/slow/stall` goes quiet this long after its first chunk.
pub(crate) const STALL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum DescriptorMode {
    /// Lists ContentDirectory at `/cd_control`.
    #[default]
    Normal,
    /// Not XML at all; the client must fall back to `/smp_4_`.
    Broken,
    /// 404.
    Missing,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeCall {
    pub path: String,
    pub action: String,
    pub body: String,
}

#[derive(Clone)]
struct FakeState {
    descriptor: DescriptorMode,
    base_url: String,
    calls: Arc<Mutex<Vec<FakeCall>>>,
}

pub(crate) struct FakeDlnaCamera {
    pub port: u16,
    calls: Arc<Mutex<Vec<FakeCall>>>,
    task: JoinHandle<()>,
}

impl FakeDlnaCamera {
    pub async fn start(descriptor: DescriptorMode) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            descriptor,
            base_url: format!("http://127.0.0.1:{port}"),
            calls: Arc::clone(&calls),
        };

        let app = Router::new()
            .route("/smp_2_", get(descriptor_handler))
            .route("/cd_control", post(soap_handler))
            .route("/smp_4_", post(soap_handler))
            .route("/media/{name}", get(media_handler))
            .route("/slow/{mode}", get(slow_handler))
            .with_state(state);
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { port, calls, task }
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.action).collect()
    }

    /// Browse calls asking for a single child, which is what the heartbeat sends.
    pub fn heartbeat_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.action == "Browse" && c.body.contains("<RequestedCount>1</RequestedCount>"))
            .count()
    }
}

impl Drop for FakeDlnaCamera {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn descriptor_handler(State(state): State<FakeState>) -> (StatusCode, String) {
    match state.descriptor {
        DescriptorMode::Normal => (
            StatusCode::OK,
            format!(
                r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0"><device>
<friendlyName>[Camera]NX300</friendlyName><manufacturer>Samsung Electronics</manufacturer>
<modelName>NX300</modelName><serialNumber>FAKE01</serialNumber>
<serviceList><service>
<serviceType>{CONTENT_DIRECTORY_NS}</serviceType><serviceId>urn:upnp-org:serviceId:ContentDirectory</serviceId>
<controlURL>/cd_control</controlURL><eventSubURL>/cd_event</eventSubURL><SCPDURL>/cd.xml</SCPDURL>
</service></serviceList></device></root>"#
            ),
        ),
        DescriptorMode::Broken => (StatusCode::OK, "<root><device><friendlyName>".to_string()),
        DescriptorMode::Missing => (StatusCode::NOT_FOUND, String::new()),
    }
}

fn envelope(action: &str, inner: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?><s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\"><s:Body>\
         <u:{action}Response xmlns:u=\"{CONTENT_DIRECTORY_NS}\">{inner}</u:{action}Response></s:Body></s:Envelope>"
    )
}

fn argument<'a>(body: &'a str, name: &str) -> &'a str {
    let open = format!("<{name}>");
    let close = format!("</{name}>");
    body.find(&open)
        .map(|start| &body[start + open.len()..])
        .and_then(|rest| rest.find(&close).map(|end| &rest[..end]))
        .unwrap_or_default()
}

fn didl_for(object_id: &str, base: &str) -> String {
    let entries = match object_id {
        "0" => format!(
            r#"<container id="PHOTO" parentID="0"><dc:title>Photos</dc:title></container>
<item id="100" parentID="0"><dc:title>SAM_0001.JPG</dc:title><dc:date>2024-03-01T12:00:00</dc:date>
<res protocolInfo="http-get:*:image/jpeg:DLNA.ORG_PN=JPEG_SM" size="2048">{base}/media/small.jpg</res>
<res protocolInfo="http-get:*:image/jpeg:DLNA.ORG_PN=JPEG_LRG" size="8192" resolution="5472x3648">{base}/media/SAM_0001.JPG</res>
<res protocolInfo="http-get:*:image/jpeg:DLNA.ORG_PN=JPEG_TN" size="100">{base}/media/tn.jpg</res></item>
<container id="0" parentID="0"><dc:title>Loop</dc:title></container>"#
        ),
        "PHOTO" => format!(
            r#"<item id="101" parentID="PHOTO"><dc:title>SAM_0002.MP4</dc:title>
<res protocolInfo="http-get:*:video/mp4:*" size="4096">{base}/media/SAM_0002.MP4</res></item>
<container id="PHOTO" parentID="PHOTO"><dc:title>Self</dc:title></container>"#
        ),
        _ => String::new(),
    };
    format!(
        "<DIDL-Lite xmlns=\"urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/\" \
         xmlns:dc=\"http://purl.org/dc/elements/1.1/\" \
         xmlns:upnp=\"urn:schemas-upnp-org:metadata-1-0/upnp/\">{entries}</DIDL-Lite>"
    )
}

async fn soap_handler(State(state): State<FakeState>, uri: Uri, headers: HeaderMap, body: String) -> (StatusCode, String) {
    let action = headers
        .get("SOAPAction")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_matches('"').rsplit('#').next().unwrap_or_default().to_string())
        .unwrap_or_default();
    state.calls.lock().unwrap().push(FakeCall {
        path: uri.path().to_string(),
        action: action.clone(),
        body: body.clone(),
    });

    match action.as_str() {
        "GetInformation" => {
            let info = escape("<Resolutions>20M,10M</Resolutions><FlashModes>Off,Auto</FlashModes>").into_owned();
            let inner = format!(
                "<Information>{info}</Information><StreamUrl>{}/livestream.avi</StreamUrl>",
                state.base_url
            );
            (StatusCode::OK, envelope(&action, &inner))
        }
        "X_RegisterClient" => (StatusCode::INTERNAL_SERVER_ERROR, String::new()),
        "X_SetClientInfo" | "X_ConnectClient" => (StatusCode::OK, envelope(&action, "")),
        "Browse" => {
            let didl = didl_for(argument(&body, "ObjectID"), &state.base_url);
            let inner = format!("<Result>{}</Result><NumberReturned>0</NumberReturned>", escape(didl.as_str()));
            (StatusCode::OK, envelope(&action, &inner))
        }
        "X_CaptureImage" => {
            let inner = format!("<ImageURL>{}/media/SAM_0003.JPG</ImageURL>", state.base_url);
            (StatusCode::OK, envelope(&action, &inner))
        }
        "GetDeviceConfiguration" => (
            StatusCode::OK,
            envelope(&action, "<Model>NX300</Model><Battery>80</Battery>"),
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, String::new()),
    }
}

async fn media_handler(Path(name): Path<String>) -> (StatusCode, Vec<u8>) {
    match name.as_str() {
        "SAM_0001.JPG" | "SAM_0003.JPG" => (StatusCode::OK, JPEG_BYTES.to_vec()),
        "tn.jpg" => (StatusCode::OK, THUMB_BYTES.to_vec()),
        "SAM_0002.MP4" => (StatusCode::OK, VIDEO_BYTES.to_vec()),
        _ => (StatusCode::NOT_FOUND, Vec::new()),
    }
}

async fn slow_handler(Path(mode): Path<String>) -> Body {
    let stall = mode == "stall";
    let chunks = futures_util::stream::unfold(0usize, move |sent| async move {
        if sent == SLOW_CHUNKS {
            return None;
        }
        let pause = if stall && sent == 1 { STALL } else { SLOW_CHUNK_PAUSE };
        tokio::time::sleep(pause).await;
        Some((Ok::<_, std::io::Error>(Bytes::from(vec![7u8; SLOW_CHUNK_LEN])), sent + 1))
    });
    Body::from_stream(chunks)
}
