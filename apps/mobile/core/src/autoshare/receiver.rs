//! Reading S2L messages off a socket, and the per-connection push state machine.

use camlink_wire::s2l::{self, HEADER_TERMINATOR, S2lHeader, S2lResult, find_header_end};
use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::PushServerError;
use crate::collaborators::PushedFileSink;

/// Bytes requested per socket read.
pub(crate) const READ_CHUNK: usize = 100 * 1024;

/// Sub-code sent with `Result_Error` when the body ended early.
pub(crate) const ERROR_INCOMPLETE_BODY: u32 = 1;
/// Sub-code sent with `Result_Error` when the sink refused the file.
pub(crate) const ERROR_SINK_FAILED: u32 = 2;

/// A header plus however much body arrived.
#[derive(Debug)]
pub(crate) struct S2lMessage {
    pub header: S2lHeader,
    pub body: Vec<u8>,
    /// False when the peer stopped before `Content-Length` bytes arrived.
    pub complete: bool,
}

/// Reads one message: accumulate until `\r\n\r\n`, parse the header, then read
/// `Content-Length` body bytes. Peer close or a read error ends the body early.
pub(crate) async fn read_message<R>(reader: &mut R) -> Result<S2lMessage, PushServerError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = vec![0u8; READ_CHUNK];

    // Bytes before `scanned` are known not to start a terminator.
    let mut scanned = 0;
    let header_end = loop {
        if let Some(end) = find_header_end(&buf[scanned..]) {
            break scanned + end;
        }
        scanned = buf.len().saturating_sub(HEADER_TERMINATOR.len() - 1);
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Err(PushServerError::Closed);
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let header = S2lHeader::parse_bytes(&buf[..header_end])?;
    let mut body = buf.split_off(header_end);
    let expected = header.content_length.unwrap_or(0) as usize;
    body.truncate(expected);

    while body.len() < expected {
        let want = (expected - body.len()).min(READ_CHUNK);
        match reader.read(&mut chunk[..want]).await {
            Ok(0) => break,
            Ok(n) => body.extend_from_slice(&chunk[..n]),
            Err(e) => {
                debug!("S2L body read stopped after {} of {expected} bytes: {e}", body.len());
                break;
            }
        }
    }
    trace!("S2L message: {:?}, body {} of {expected}", header.request_line, body.len());

    Ok(S2lMessage {
        complete: body.len() == expected,
        header,
        body,
    })
}

/// What happened on one inbound connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The camera said goodbye. No reply sent.
    Bye,
    /// Header without a file (keep-alive, notification). Acknowledged.
    Acknowledged { request_line: String },
    /// A complete file went to the sink.
    Received { filename: String, size: usize },
    /// The body ended early; the sink never saw it.
    Incomplete { filename: String, received: usize, expected: u64 },
    /// The sink refused a complete file.
    SinkFailed { filename: String, reason: String },
}

/// Runs the push state machine on one connection and closes it.
pub(crate) async fn handle_push<S>(stream: &mut S, sink: &dyn PushedFileSink) -> Result<PushOutcome, PushServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let message = read_message(stream).await?;
    let header = &message.header;

    if header.is_bye() {
        return Ok(PushOutcome::Bye);
    }

    let (Some(filename), Some(expected)) = (header.filename.clone(), header.content_length) else {
        reply(stream, header, S2lResult::Ok, 0).await;
        return Ok(PushOutcome::Acknowledged {
            request_line: header.request_line.clone(),
        });
    };

    if !message.complete {
        reply(stream, header, S2lResult::Error, ERROR_INCOMPLETE_BODY).await;
        return Ok(PushOutcome::Incomplete {
            filename,
            received: message.body.len(),
            expected,
        });
    }

    let size = message.body.len();
    match sink.receive(&filename, message.body) {
        Ok(()) => {
            reply(stream, &message.header, S2lResult::Ok, 0).await;
            Ok(PushOutcome::Received { filename, size })
        }
        Err(e) => {
            reply(stream, &message.header, S2lResult::Error, ERROR_SINK_FAILED).await;
            Ok(PushOutcome::SinkFailed {
                filename,
                reason: e.to_string(),
            })
        }
    }
}

/// Best effort: the camera may already have hung up.
async fn reply<W>(writer: &mut W, header: &S2lHeader, result: S2lResult, error_code: u32)
where
    W: AsyncWrite + Unpin,
{
    let frame = s2l::build_response(header, result, error_code);
    if let Err(e) = writer.write_all(&frame).await {
        debug!("S2L reply not delivered: {e}");
        return;
    }
    let _ = writer.flush().await;
    let _ = writer.shutdown().await;
}
