//! WebSocket frame codec.
//!
//! Only single, unfragmented text frames are supported. Any other opcode
//! (binary, close, ping, continuation) is a protocol error that ends the
//! session.
//!
//! Lengths use the full RFC 6455 widths: 7 bits, then a 16-bit or a 64-bit
//! big-endian extension.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::websocket::WsError;

/// Opcode of a text frame.
pub const OPCODE_TEXT: u8 = 0x1;

/// Default upper bound on a frame payload.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const FIN_TEXT: u8 = 0x80 | OPCODE_TEXT;
const MASK_BIT: u8 = 0x80;

/// A decoded or to-be-encoded text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u8,
    pub mask: Option<[u8; 4]>,
    /// Unmasked payload bytes.
    pub payload: Vec<u8>,
}

impl Frame {
    /// An unmasked text frame, as sent by the server.
    pub fn text(text: &str) -> Self {
        Self {
            opcode: OPCODE_TEXT,
            mask: None,
            payload: text.as_bytes().to_vec(),
        }
    }

    /// Mask the frame on encode, as a client does.
    pub fn with_mask(mut self, mask: [u8; 4]) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Serialize the frame.
    pub fn encode(&self) -> Vec<u8> {
        let len = self.payload.len();
        let mask_bit = if self.mask.is_some() { MASK_BIT } else { 0 };
        let mut out = Vec::with_capacity(len + 14);

        out.push(FIN_TEXT);
        if len <= 125 {
            out.push(mask_bit | len as u8);
        } else if len <= u16::MAX as usize {
            out.push(mask_bit | 126);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            out.push(mask_bit | 127);
            out.extend_from_slice(&(len as u64).to_be_bytes());
        }

        match self.mask {
            Some(mask) => {
                out.extend_from_slice(&mask);
                out.extend(self.payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
            }
            None => out.extend_from_slice(&self.payload),
        }
        out
    }

    /// Interpret the payload as UTF-8 text.
    pub fn into_text(self) -> Result<String, WsError> {
        Ok(String::from_utf8(self.payload)?)
    }
}

/// Encode `text` as a server frame.
pub fn encode_text(text: &str) -> Vec<u8> {
    Frame::text(text).encode()
}

/// Read one frame.
///
/// A stream that ends before the frame is complete yields an I/O error.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Frame, WsError>
where
    R: AsyncRead + Unpin,
{
    let opcode = reader.read_u8().await? & 0x0F;
    if opcode != OPCODE_TEXT {
        return Err(WsError::UnsupportedOpcode(opcode));
    }

    let len_byte = reader.read_u8().await?;
    let masked = len_byte & MASK_BIT != 0;
    let len = match len_byte & !MASK_BIT {
        126 => u64::from(reader.read_u16().await?),
        127 => reader.read_u64().await?,
        n => u64::from(n),
    };

    if len > max_frame_size as u64 {
        return Err(WsError::FrameTooLarge {
            size: len,
            limit: max_frame_size,
        });
    }

    let mask = if masked {
        let mut key = [0u8; 4];
        reader.read_exact(&mut key).await?;
        Some(key)
    } else {
        None
    };

    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    if let Some(key) = mask {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= key[i % 4];
        }
    }

    Ok(Frame {
        opcode,
        mask,
        payload,
    })
}

/// Read one frame and decode its text.
pub async fn read_text<R>(reader: &mut R, max_frame_size: usize) -> Result<String, WsError>
where
    R: AsyncRead + Unpin,
{
    read_frame(reader, max_frame_size).await?.into_text()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASK: [u8; 4] = [0x37, 0xFA, 0x21, 0x3D];

    async fn decode(bytes: &[u8]) -> Result<String, WsError> {
        let mut reader = bytes;
        read_text(&mut reader, DEFAULT_MAX_FRAME_SIZE).await
    }

    #[tokio::test]
    async fn masked_round_trip_across_length_boundaries() {
        for len in [0usize, 1, 125, 126, 65535, 65536] {
            let text = "x".repeat(len);
            let encoded = Frame::text(&text).with_mask(MASK).encode();
            let decoded = decode(&encoded).await.unwrap();
            assert_eq!(decoded.len(), len, "length {len}");
            assert_eq!(decoded, text);
        }
    }

    #[test]
    fn length_headers_use_rfc_widths() {
        assert_eq!(&encode_text(&"a".repeat(125))[..2], [0x81, 125]);
        assert_eq!(&encode_text(&"a".repeat(126))[..4], [0x81, 126, 0x00, 0x7E]);
        assert_eq!(&encode_text(&"a".repeat(65535))[..4], [0x81, 126, 0xFF, 0xFF]);
        assert_eq!(
            &encode_text(&"a".repeat(65536))[..10],
            [0x81, 127, 0, 0, 0, 0, 0, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn server_frames_are_unmasked() {
        assert_eq!(encode_text("Hi"), [0x81, 0x02, b'H', b'i']);
    }

    #[tokio::test]
    async fn decodes_rfc_masked_hello() {
        let frame = [0x81, 0x85, 0x37, 0xFA, 0x21, 0x3D, 0x7F, 0x9F, 0x4D, 0x51, 0x58];
        assert_eq!(decode(&frame).await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn rejects_non_text_opcodes() {
        let close = [0x88, 0x80, 0, 0, 0, 0];
        assert!(matches!(decode(&close).await, Err(WsError::UnsupportedOpcode(8))));
        let binary = [0x82, 0x00];
        assert!(matches!(decode(&binary).await, Err(WsError::UnsupportedOpcode(2))));
    }

    #[tokio::test]
    async fn short_frame_is_an_io_error() {
        assert!(matches!(decode(&[0x81, 0x05, b'a']).await, Err(WsError::Io(_))));
        assert!(matches!(decode(&[]).await, Err(WsError::Io(_))));
    }

    #[tokio::test]
    async fn enforces_frame_limit() {
        let encoded = encode_text(&"a".repeat(200));
        let mut reader = &encoded[..];
        let err = read_frame(&mut reader, 100).await.unwrap_err();
        assert!(matches!(err, WsError::FrameTooLarge { size: 200, limit: 100 }));
    }

    #[tokio::test]
    async fn invalid_utf8_is_rejected() {
        assert!(matches!(decode(&[0x81, 0x02, 0xC3, 0x28]).await, Err(WsError::InvalidUtf8(_))));
    }
}
