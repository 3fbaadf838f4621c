//! Registering with the camera on its S2L registration port.
//!
//! The camera only pushes to phones it has approved. Approval may need a button
//! press on the camera, so a parsable but non-accepting answer still counts as
//! "registered, awaiting approval".

use camlink_wire::s2l::{self, DEFAULT_HOST, S2lHeader, find_header_end};
use log::{debug, warn};
use quick_xml::escape::escape;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout_at};

use super::PushServerError;
use crate::config::CamlinkConfig;
use crate::log_buffer::LogBuffer;

/// Substrings of a registration reply that mean the camera accepted us.
pub const ACCEPTANCE_MARKERS: [&str; 3] = ["200 OK", "ACCEPTED", "Result_OK"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HandshakeSettings {
    pub client_name: String,
    pub registration_port: u16,
    pub attempts: u32,
    pub attempt_timeout: Duration,
    pub timeout_pause: Duration,
    pub error_pause: Duration,
}

impl HandshakeSettings {
    pub fn from_config(config: &CamlinkConfig) -> Self {
        Self {
            client_name: config.client_name.clone(),
            registration_port: config.registration_port,
            attempts: config.handshake_attempts.max(1),
            attempt_timeout: config.handshake_timeout,
            timeout_pause: config.handshake_timeout_pause,
            error_pause: config.handshake_error_pause,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeOutcome {
    Accepted,
    AwaitingApproval,
    /// Every attempt failed or timed out.
    NoResponse,
}

pub(crate) fn classify(reply: &str) -> HandshakeOutcome {
    if ACCEPTANCE_MARKERS.iter().any(|marker| reply.contains(marker)) {
        HandshakeOutcome::Accepted
    } else {
        HandshakeOutcome::AwaitingApproval
    }
}

/// XML body announcing where we listen.
pub(crate) fn registration_body(client_name: &str, local_ip: Ipv4Addr, listen_port: u16) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <S2L><Command>Register</Command><ClientName>{}</ClientName>\
         <ClientIP>{local_ip}</ClientIP><ClientPort>{listen_port}</ClientPort></S2L>",
        escape(client_name)
    )
}

/// Up to `attempts` request/reply exchanges, each under its own timeout.
pub(crate) async fn register(
    settings: &HandshakeSettings,
    camera_ip: Ipv4Addr,
    local_ip: Ipv4Addr,
    listen_port: u16,
    log: &LogBuffer,
) -> HandshakeOutcome {
    let body = registration_body(&settings.client_name, local_ip, listen_port);
    let request = s2l::build_request(DEFAULT_HOST, &settings.client_name, &body);

    for attempt in 1..=settings.attempts {
        log.sent(format!(
            "Registration attempt {attempt}/{} to {camera_ip}:{}",
            settings.attempts, settings.registration_port
        ));
        let exchange = exchange(camera_ip, settings.registration_port, &request, settings.attempt_timeout);
        let pause = match exchange.await {
            Ok(reply) => {
                let outcome = classify(&reply);
                log.received(format!("Registration reply: {} ({outcome:?})", first_line(&reply)));
                return outcome;
            }
            Err(AttemptError::Failed(e)) => {
                log.error(format!("Registration attempt {attempt} failed: {e}"));
                settings.error_pause
            }
            Err(AttemptError::TimedOut) => {
                log.error(format!(
                    "Registration attempt {attempt} timed out after {:?}",
                    settings.attempt_timeout
                ));
                settings.timeout_pause
            }
        };
        if attempt < settings.attempts {
            tokio::time::sleep(pause).await;
        }
    }

    warn!("AutoShare: camera at {camera_ip} never answered registration");
    HandshakeOutcome::NoResponse
}

#[derive(Debug)]
enum AttemptError {
    /// Nothing arrived before the attempt deadline.
    TimedOut,
    Failed(PushServerError),
}

impl From<std::io::Error> for AttemptError {
    fn from(e: std::io::Error) -> Self {
        Self::Failed(e.into())
    }
}

/// One request/reply exchange, all of it before `wait` runs out.
async fn exchange(camera_ip: Ipv4Addr, port: u16, request: &[u8], wait: Duration) -> Result<String, AttemptError> {
    let deadline = Instant::now() + wait;
    let mut stream = timeout_at(deadline, TcpStream::connect((camera_ip, port)))
        .await
        .map_err(|_| AttemptError::TimedOut)??;
    timeout_at(deadline, async {
        stream.write_all(request).await?;
        stream.flush().await
    })
    .await
    .map_err(|_| AttemptError::TimedOut)??;
    read_reply(&mut stream, deadline).await
}

/// Reads the camera's answer. Cameras don't always finish the header before
/// hanging up, so whatever text arrived by close or deadline is the reply. Only
/// an empty reply is a failure.
async fn read_reply<R>(reader: &mut R, deadline: Instant) -> Result<String, AttemptError>
where
    R: AsyncRead + Unpin,
{
    let mut reply = Vec::new();
    let mut chunk = [0u8; 4096];
    while !reply_complete(&reply) {
        match timeout_at(deadline, reader.read(&mut chunk)).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => reply.extend_from_slice(&chunk[..n]),
            Ok(Err(e)) if reply.is_empty() => return Err(e.into()),
            Err(_) if reply.is_empty() => return Err(AttemptError::TimedOut),
            Ok(Err(e)) => {
                debug!("Registration reply cut short: {e}");
                break;
            }
            Err(_) => {
                debug!("Registration reply unfinished at deadline");
                break;
            }
        }
    }

    let text = String::from_utf8_lossy(&reply).trim().to_string();
    if text.is_empty() {
        return Err(AttemptError::Failed(PushServerError::Closed));
    }
    Ok(text)
}

/// Header terminated and `Content-Length` body bytes present.
fn reply_complete(buf: &[u8]) -> bool {
    let Some(end) = find_header_end(buf) else {
        return false;
    };
    match S2lHeader::parse_bytes(&buf[..end]) {
        Ok(header) => buf.len() - end >= header.content_length.unwrap_or(0) as usize,
        Err(_) => true,
    }
}

/// Best effort goodbye, bounded by one attempt timeout.
pub(crate) async fn send_bye(settings: &HandshakeSettings, camera_ip: Ipv4Addr, log: &LogBuffer) {
    let bye = s2l::build_bye(DEFAULT_HOST, &settings.client_name);
    let send = async {
        let mut stream = TcpStream::connect((camera_ip, settings.registration_port)).await?;
        stream.write_all(&bye).await?;
        stream.shutdown().await
    };
    match tokio::time::timeout(settings.attempt_timeout, send).await {
        Ok(Ok(())) => {
            log.sent(format!("ByeBye sent to {camera_ip}"));
        }
        Ok(Err(e)) => debug!("ByeBye to {camera_ip} failed: {e}"),
        Err(_) => debug!("ByeBye to {camera_ip} timed out"),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
