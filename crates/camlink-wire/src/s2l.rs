//! S2L/1.0, the text protocol behind AutoShare.
//!
//! A message is a request (or result) line, `Key: value` lines, a blank line, and
//! then `Content-Length` bytes of body:
//!
//! ```text
//! S2L/1.0 /DCIM/100PHOTO/SAM_0001.JPG\r\n
//! Content-Length: 1024\r\n
//! Host: SAMSUNG-S2L\r\n
//! \r\n
//! <1024 bytes of JPEG>
//! ```

use crate::WireError;
use log::trace;

pub const S2L_VERSION: &str = "S2L/1.0";

/// Separates the header block from the body.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Host value the camera expects from phones.
pub const DEFAULT_HOST: &str = "SAMSUNG-S2L";

/// A parsed S2L header block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct S2lHeader {
    pub request_line: String,
    /// Last path segment of the request target, when it looks like a file name.
    pub filename: Option<String>,
    pub content_length: Option<u64>,
    pub host: Option<String>,
    pub authorization: Option<String>,
    /// Every `key: value` line in arrival order, keys as sent.
    pub fields: Vec<(String, String)>,
}

impl S2lHeader {
    /// Parses a header block. Text after the first blank line is ignored.
    pub fn parse(text: &str) -> Result<Self, WireError> {
        let block = match text.find("\r\n\r\n") {
            Some(end) => &text[..end],
            None => text,
        };

        let mut lines = block.split("\r\n");
        let request_line = lines.next().unwrap_or_default().trim().to_string();
        if request_line.is_empty() {
            return Err(WireError::InvalidHeader("missing request line".to_string()));
        }

        let mut header = Self {
            filename: extract_filename(&request_line),
            request_line,
            ..Self::default()
        };

        for line in lines {
            let Some((key, value)) = line.split_once(':') else {
                trace!("S2L: ignoring header line without colon: {line:?}");
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            match key.to_ascii_lowercase().as_str() {
                "content-length" => header.content_length = value.parse().ok(),
                "host" => header.host = Some(value.to_string()),
                "authorization" => header.authorization = Some(value.to_string()),
                _ => {}
            }
            header.fields.push((key.to_string(), value.to_string()));
        }

        Ok(header)
    }

    /// Parses the header part of a raw byte buffer (lossy UTF-8).
    pub fn parse_bytes(buf: &[u8]) -> Result<Self, WireError> {
        let end = find_header_end(buf).map(|end| end - HEADER_TERMINATOR.len()).unwrap_or(buf.len());
        Self::parse(&String::from_utf8_lossy(&buf[..end]))
    }

    /// The camera says goodbye with `S2L/1.0 ByeBye`.
    pub fn is_bye(&self) -> bool {
        self.request_line.to_ascii_lowercase().contains("byebye")
    }

    /// Looks up any header field, case-insensitively.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Returns the offset just past the first `\r\n\r\n`, if present.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
        .map(|pos| pos + HEADER_TERMINATOR.len())
}

fn extract_filename(request_line: &str) -> Option<String> {
    request_line
        .split_whitespace()
        .filter(|token| !token.to_ascii_uppercase().starts_with("S2L/"))
        .filter_map(|token| token.rsplit('/').next())
        .find(|segment| segment.contains('.'))
        .map(str::to_string)
}

/// Outcome carried in a response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S2lResult {
    Ok,
    Error,
}

impl S2lResult {
    fn token(self) -> &'static str {
        match self {
            Self::Ok => "Result_OK",
            Self::Error => "Result_Error",
        }
    }
}

fn build_message(line: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut text = format!("{S2L_VERSION} {line}\r\n");
    for (key, value) in headers {
        text.push_str(&format!("{key}: {value}\r\n"));
    }
    text.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
    let mut out = text.into_bytes();
    out.extend_from_slice(body);
    out
}

/// Builds the response to a pushed message, mirroring its `Host` and
/// `Authorization` fields.
pub fn build_response(request: &S2lHeader, result: S2lResult, error_code: u32) -> Vec<u8> {
    let host = request.host.as_deref().unwrap_or(DEFAULT_HOST);
    let authorization = request.authorization.as_deref().unwrap_or_default();
    let code = error_code.to_string();
    build_message(
        result.token(),
        &[("Host", host), ("Authorization", authorization), ("Error-Code", &code)],
        &[],
    )
}

/// Builds a registration request carrying an XML body.
pub fn build_request(host: &str, authorization: &str, body: &str) -> Vec<u8> {
    build_message(
        "Request",
        &[("Host", host), ("Authorization", authorization), ("Content-Type", "text/xml")],
        body.as_bytes(),
    )
}

/// Builds the goodbye message sent when the phone stops listening.
pub fn build_bye(host: &str, authorization: &str) -> Vec<u8> {
    build_message("ByeBye", &[("Host", host), ("Authorization", authorization)], &[])
}
