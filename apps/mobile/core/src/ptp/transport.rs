//! Length-prefixed packet I/O over a PTP/IP socket.

use camlink_wire::frame::declared_length;
use camlink_wire::{HEADER_LEN, Packet};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::PtpError;

/// Upper bound for a single frame. Cameras chunk large objects into Data packets
/// well below this.
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Reads exactly `len` bytes, failing with `Timeout` if they don't arrive in time.
pub(crate) async fn read_exact_timeout<R>(reader: &mut R, len: usize, timeout: Duration) -> Result<Vec<u8>, PtpError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; len];
    match tokio::time::timeout(timeout, reader.read_exact(&mut buf)).await {
        Ok(Ok(_)) => Ok(buf),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(PtpError::Timeout),
    }
}

/// Reads one packet: the 4 byte length first (waiting up to `header_wait`), then
/// the rest of the frame under `body_timeout`.
pub(crate) async fn read_packet<R>(reader: &mut R, header_wait: Duration, body_timeout: Duration) -> Result<Packet, PtpError>
where
    R: AsyncRead + Unpin,
{
    let prefix = read_exact_timeout(reader, 4, header_wait).await?;
    let length = declared_length([prefix[0], prefix[1], prefix[2], prefix[3]]);
    if (length as usize) < HEADER_LEN || length > MAX_FRAME_LEN {
        return Err(PtpError::InvalidFrame(format!("declared length {length}")));
    }

    let rest = read_exact_timeout(reader, length as usize - 4, body_timeout).await?;
    let mut frame = prefix;
    frame.extend_from_slice(&rest);
    Ok(Packet::decode(&frame)?)
}

pub(crate) async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), PtpError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&packet.encode()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camlink_wire::ResponseCode;

    const WAIT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_packet_round_trip_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let packet = Packet::OperationResponse {
            code: ResponseCode::Ok,
            transaction_id: 3,
            params: vec![9],
        };
        write_packet(&mut a, &packet).await.unwrap();
        let received = read_packet(&mut b, WAIT, WAIT).await.unwrap();
        assert_eq!(received, packet);
    }

    #[tokio::test]
    async fn test_eof_is_disconnected() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        assert_eq!(read_packet(&mut b, WAIT, WAIT).await, Err(PtpError::Disconnected));
    }

    #[tokio::test]
    async fn test_silence_is_timeout() {
        let (_a, mut b) = tokio::io::duplex(64);
        let result = read_packet(&mut b, Duration::from_millis(50), WAIT).await;
        assert_eq!(result, Err(PtpError::Timeout));
    }

    #[tokio::test]
    async fn test_short_declared_length_is_invalid() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&[4, 0, 0, 0, 1, 0, 0, 0]).await.unwrap();
        assert!(matches!(
            read_packet(&mut b, WAIT, WAIT).await,
            Err(PtpError::InvalidFrame(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_packet_type_is_invalid() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&[8, 0, 0, 0, 0x42, 0, 0, 0]).await.unwrap();
        assert!(matches!(
            read_packet(&mut b, WAIT, WAIT).await,
            Err(PtpError::InvalidFrame(_))
        ));
    }
}
