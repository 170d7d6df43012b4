//! Wire framing: every message is `[u32 big-endian length][UTF-8 payload]`,
//! one request and one response per connection.

use crate::error::{ProtoError, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// 10 MiB receive ceiling. An oversized length fails the read and the caller
/// drops the connection.
pub const MAX_FRAME_LEN: usize = 10 * 1024 * 1024;

pub async fn write_frame<W>(writer: &mut W, payload: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = payload.as_bytes();
    writer.write_u32(bytes.len() as u32).await?;
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R>(reader: &mut R) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtoError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(String::from_utf8(buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn roundtrip_preserves_payload() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        write_frame(&mut a, "EXECUTE TEST|hello").await.unwrap();
        assert_eq!(read_frame(&mut b).await.unwrap(), "EXECUTE TEST|hello");
    }

    #[tokio::test]
    async fn roundtrip_empty_payload() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_frame(&mut a, "").await.unwrap();
        assert_eq!(read_frame(&mut b).await.unwrap(), "");
    }

    #[tokio::test]
    async fn roundtrip_at_boundary_sizes() {
        // Large-but-legal frame on one side of the limit.
        let payload = "x".repeat(64 * 1024);
        let (mut a, mut b) = tokio::io::duplex(256 * 1024);
        let writer = tokio::spawn(async move {
            write_frame(&mut a, &payload).await.unwrap();
            payload
        });
        let got = read_frame(&mut b).await.unwrap();
        assert_eq!(got, writer.await.unwrap());
    }

    #[tokio::test]
    async fn oversized_length_fails_deterministically() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32((MAX_FRAME_LEN + 1) as u32).await.unwrap();
        match read_frame(&mut b).await {
            Err(ProtoError::FrameTooLarge { len, max }) => {
                assert_eq!(len, MAX_FRAME_LEN + 1);
                assert_eq!(max, MAX_FRAME_LEN);
            }
            other => panic!("expected FrameTooLarge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn truncated_frame_fails() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32(100).await.unwrap();
        a.write_all(b"short").await.unwrap();
        drop(a);
        assert!(matches!(read_frame(&mut b).await, Err(ProtoError::Io(_))));
    }
}
