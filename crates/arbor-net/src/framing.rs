//! Length-prefixed framing over TCP.
//!
//! One message per frame:
//!
//! ```text
//! +-------------------+--------------------+
//! | length (4 bytes)  |   payload          |
//! | u32 little-endian |   (length bytes)   |
//! +-------------------+--------------------+
//! ```
//!
//! The prefix counts payload bytes only. A zero-length frame is valid and
//! carries no message.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Maximum accepted payload size: 1 MiB.
pub const MAX_PAYLOAD_BYTES: u32 = 1_048_576;

/// Errors from the framing layer.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload size exceeds [`MAX_PAYLOAD_BYTES`].
    #[error("payload size {size} exceeds maximum {MAX_PAYLOAD_BYTES}")]
    PayloadTooLarge {
        /// The offending payload size.
        size: u32,
    },

    /// The peer closed the stream mid-frame.
    #[error("connection closed")]
    ConnectionClosed,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn closed_on_eof(e: std::io::Error) -> FrameError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        FrameError::ConnectionClosed
    } else {
        FrameError::Io(e)
    }
}

/// Reads one frame, returning its payload. Blocks until the frame is
/// complete; a clean or mid-frame close yields
/// [`FrameError::ConnectionClosed`].
pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await.map_err(closed_on_eof)?;

    let len = u32::from_le_bytes(len_buf);
    if len > MAX_PAYLOAD_BYTES {
        return Err(FrameError::PayloadTooLarge { size: len });
    }

    let mut payload = vec![0u8; len as usize];
    if len > 0 {
        reader
            .read_exact(&mut payload)
            .await
            .map_err(closed_on_eof)?;
    }
    Ok(payload)
}

/// Writes one frame: length prefix, payload, flush.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), FrameError> {
    let len = payload.len() as u32;
    if len > MAX_PAYLOAD_BYTES {
        return Err(FrameError::PayloadTooLarge { size: len });
    }
    writer.write_all(&len.to_le_bytes()).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, duplex};

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let (mut client, mut server) = duplex(8192);
        write_frame(&mut client, b"hello world").await.unwrap();
        let received = read_frame(&mut server).await.unwrap();
        assert_eq!(received, b"hello world");
    }

    #[tokio::test]
    async fn test_back_to_back_frames_dont_merge() {
        let (mut client, mut server) = duplex(8192);
        write_frame(&mut client, b"aaa").await.unwrap();
        write_frame(&mut client, b"bbb").await.unwrap();

        assert_eq!(read_frame(&mut server).await.unwrap(), b"aaa");
        assert_eq!(read_frame(&mut server).await.unwrap(), b"bbb");
    }

    #[tokio::test]
    async fn test_oversized_length_prefix_rejected() {
        let (mut client, mut server) = duplex(8192);
        let fake_len = MAX_PAYLOAD_BYTES + 1;
        client.write_all(&fake_len.to_le_bytes()).await.unwrap();
        client.flush().await.unwrap();

        let result = read_frame(&mut server).await;
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { .. })));
    }

    #[tokio::test]
    async fn test_close_during_length_read_reports_closed() {
        let (client, mut server) = duplex(8192);
        drop(client);
        let result = read_frame(&mut server).await;
        assert!(matches!(result, Err(FrameError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_close_mid_payload_reports_closed() {
        let (mut client, mut server) = duplex(8192);
        client.write_all(&8u32.to_le_bytes()).await.unwrap();
        client.write_all(b"abc").await.unwrap();
        client.flush().await.unwrap();
        drop(client);

        let result = read_frame(&mut server).await;
        assert!(matches!(result, Err(FrameError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_zero_length_frame_valid() {
        let (mut client, mut server) = duplex(8192);
        write_frame(&mut client, &[]).await.unwrap();
        assert!(read_frame(&mut server).await.unwrap().is_empty());
    }
}
