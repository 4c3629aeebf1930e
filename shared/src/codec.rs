//! Length-prefixed bincode framing for packets on a byte stream

use crate::Packet;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single encoded packet.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("frame of {0} bytes exceeds the {max} byte limit", max = MAX_FRAME_LEN)]
    FrameTooLarge(usize),
}

impl CodecError {
    /// True when the peer closed the stream between frames.
    pub fn is_closed(&self) -> bool {
        matches!(self, CodecError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

pub fn encode(packet: &Packet) -> Result<Vec<u8>, CodecError> {
    let body = bincode::serialize(packet)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(body.len()));
    }
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(packet)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_packet<R>(reader: &mut R) -> Result<Packet, CodecError>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await? as usize;
    if len > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(len));
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(bincode::deserialize(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BlockRecord;

    #[tokio::test]
    async fn test_frames_survive_a_stream() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let packets = vec![
            Packet::Connect { client_version: 1 },
            Packet::WorldSnapshot {
                blocks: (0..50)
                    .map(|i| BlockRecord::new(i % 5, i / 5, 0, "grass"))
                    .collect(),
            },
            Packet::Disconnect,
        ];

        let sent = packets.clone();
        let writer = tokio::spawn(async move {
            for packet in &sent {
                write_packet(&mut a, packet).await.unwrap();
            }
        });

        for expected in &packets {
            let received = read_packet(&mut b).await.unwrap();
            assert_eq!(&received, expected);
        }
        writer.await.unwrap();

        let closed = read_packet(&mut b).await.unwrap_err();
        assert!(closed.is_closed());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_u32((MAX_FRAME_LEN + 1) as u32).await.unwrap();

        let err = read_packet(&mut b).await.unwrap_err();
        assert!(matches!(err, CodecError::FrameTooLarge(_)));
    }

    #[test]
    fn test_encode_prefixes_length() {
        let frame = encode(&Packet::Disconnect).unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);
    }

    #[test]
    fn test_garbage_body_is_an_encode_error() {
        let result = tokio_test::block_on(async {
            let mut bytes: &[u8] = &[0, 0, 0, 2, 0xff, 0xff];
            read_packet(&mut bytes).await
        });
        assert!(matches!(result, Err(CodecError::Encode(_))));
    }
}
