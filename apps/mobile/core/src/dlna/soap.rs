//! SOAP 1.1 transport for the camera's ContentDirectory dialect.

use quick_xml::escape::escape;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

use super::{CONTENT_DIRECTORY_NS, DlnaError};
use crate::log_buffer::LogBuffer;

/// Builds the request envelope for `action` with `args` as child elements, in order.
pub fn build_envelope(action: &str, args: &[(&str, String)]) -> String {
    let mut body = String::new();
    for (name, value) in args {
        body.push_str(&format!("<{name}>{}</{name}>", escape(value.as_str())));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\" \
         s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\">\
         <s:Body><u:{action} xmlns:u=\"{CONTENT_DIRECTORY_NS}\">{body}</u:{action}></s:Body>\
         </s:Envelope>"
    )
}

/// Value of the `SOAPAction` header: the quoted, namespaced action.
pub fn soap_action_header(action: &str) -> String {
    format!("\"{CONTENT_DIRECTORY_NS}#{action}\"")
}

/// Decodes a response body, trying UTF-8, ASCII, Latin-1 and UTF-16 in that order.
///
/// A candidate counts only when it is non-blank and free of NUL characters, so a
/// UTF-16 body falls through the single-byte decoders.
pub fn decode_body(bytes: &[u8]) -> String {
    let usable = |text: &str| !text.trim().is_empty() && !text.contains('\0');

    if let Ok(text) = std::str::from_utf8(bytes) {
        if usable(text) {
            return text.to_string();
        }
    }
    if bytes.is_ascii() {
        let text: String = bytes.iter().map(|&b| b as char).collect();
        if usable(&text) {
            return text;
        }
    }
    let latin1: String = bytes.iter().map(|&b| b as char).collect();
    if usable(&latin1) {
        return latin1;
    }
    let utf16 = decode_utf16(bytes);
    if usable(&utf16) {
        return utf16;
    }
    String::new()
}

fn decode_utf16(bytes: &[u8]) -> String {
    let (big_endian, body) = match bytes {
        [0xFE, 0xFF, rest @ ..] => (true, rest),
        [0xFF, 0xFE, rest @ ..] => (false, rest),
        _ => (false, bytes),
    };
    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16_lossy(&units)
}

/// Joins a possibly relative URL from the camera onto `base` (`http://host:port`).
pub fn resolve_url(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if url.starts_with('/') {
        format!("{base}{url}")
    } else {
        format!("{base}/{url}")
    }
}

/// A ContentDirectory control URL plus the HTTP client to reach it. Cheap to
/// clone; the heartbeat task holds its own copy.
#[derive(Debug, Clone)]
pub struct SoapEndpoint {
    http: reqwest::Client,
    control_url: String,
    timeout: Duration,
    log: LogBuffer,
}

impl SoapEndpoint {
    pub fn new(http: reqwest::Client, control_url: String, timeout: Duration, log: LogBuffer) -> Self {
        Self {
            http,
            control_url,
            timeout,
            log,
        }
    }

    pub fn control_url(&self) -> &str {
        &self.control_url
    }

    /// POSTs one SOAP action and returns the decoded response body.
    /// Anything but HTTP 200 is `HttpStatus`.
    pub async fn call(&self, action: &str, args: &[(&str, String)]) -> Result<String, DlnaError> {
        self.log.sent(format!("SOAP {action}"));
        let response = self
            .http
            .post(&self.control_url)
            .header("SOAPAction", soap_action_header(action))
            .header(CONTENT_TYPE, "text/xml; charset=\"utf-8\"")
            .body(build_envelope(action, args))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if status != StatusCode::OK {
            self.log.error(format!("SOAP {action} -> HTTP {}", status.as_u16()));
            return Err(DlnaError::HttpStatus(status.as_u16()));
        }

        let text = decode_body(&bytes);
        self.log.received(format!("SOAP {action} -> {} bytes", text.len()));
        Ok(text)
    }
}
