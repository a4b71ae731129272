//! Wire protocol.
//!
//! Requests and responses are bincode-encoded and carried in frames:
//!
//! ```text
//! ┌────────────┬────────────┬──────────────────────┐
//! │ magic: u32 │  len: u32  │  payload (len bytes) │
//! └────────────┴────────────┴──────────────────────┘
//! ```
//!
//! The header is big-endian. One request frame is answered by exactly one
//! response frame, in order, on the same connection.

use memkeep_common::BlockId;
use memkeep_core::{ArenaUsage, StatsSnapshot};
use serde::{Deserialize, Serialize};

/// A request sent to the memory service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    /// Allocate a block of `size` bytes.
    Create {
        /// Block size in bytes.
        size: u64,
    },
    /// Write `data` at the start of a block.
    Set {
        /// Target block.
        id: BlockId,
        /// Bytes to write.
        data: Vec<u8>,
    },
    /// Read the first `size` bytes of a block.
    Get {
        /// Source block.
        id: BlockId,
        /// Bytes to read.
        size: u64,
    },
    /// Add a reference to a block.
    IncreaseRefCount {
        /// Target block.
        id: BlockId,
    },
    /// Drop a reference to a block.
    DecreaseRefCount {
        /// Target block.
        id: BlockId,
    },
    /// Compact the arena.
    Defragment,
    /// Fetch usage and counters.
    Stats,
}

impl Request {
    /// Short operation name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Set { .. } => "set",
            Self::Get { .. } => "get",
            Self::IncreaseRefCount { .. } => "increase_ref_count",
            Self::DecreaseRefCount { .. } => "decrease_ref_count",
            Self::Defragment => "defragment",
            Self::Stats => "stats",
        }
    }
}

/// Usage and counters reported by [`Request::Stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Arena usage.
    pub usage: ArenaUsage,
    /// Manager counters.
    pub counters: StatsSnapshot,
}

/// A response from the memory service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// A block was created.
    Created {
        /// The new block.
        id: BlockId,
    },
    /// The request succeeded and carries no data.
    Ok,
    /// Bytes read from a block.
    Data {
        /// The bytes.
        bytes: Vec<u8>,
    },
    /// Usage and counters.
    Stats(ServiceStats),
    /// The request failed.
    Error {
        /// Numeric [`memkeep_common::ErrorCode`].
        code: u16,
        /// Human-readable message.
        message: String,
    },
}

/// Frame encoding and decoding.
pub mod frame {
    use bytes::{Buf, BufMut, Bytes, BytesMut};
    use memkeep_common::MAX_FRAME_PAYLOAD;
    use serde::de::DeserializeOwned;
    use serde::Serialize;

    use crate::error::{ProtocolError, ProtocolResult};

    /// Magic number opening every frame.
    pub const FRAME_MAGIC: u32 = 0x4D4B_4550; // "MKEP"

    /// Header size in bytes.
    pub const HEADER_SIZE: usize = 4 + 4; // magic + len

    /// Largest block read that fits in one `Response::Data` frame.
    pub const MAX_DATA_LEN: usize = MAX_FRAME_PAYLOAD - (4 + 8); // variant tag + vec len

    /// Encodes a message into a frame.
    pub fn encode<T: Serialize>(message: &T) -> ProtocolResult<Bytes> {
        let payload = bincode::serialize(message)
            .map_err(|e| ProtocolError::SerializationFailed(e.to_string()))?;

        if payload.len() > MAX_FRAME_PAYLOAD {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len(),
                max: MAX_FRAME_PAYLOAD,
            });
        }

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        buf.put_u32(FRAME_MAGIC);
        buf.put_u32(payload.len() as u32);
        buf.put_slice(&payload);

        Ok(buf.freeze())
    }

    /// Decodes a complete frame.
    pub fn decode<T: DeserializeOwned>(mut data: Bytes) -> ProtocolResult<T> {
        if data.len() < HEADER_SIZE {
            return Err(ProtocolError::DeserializationFailed(
                "frame too short".to_string(),
            ));
        }

        let magic = data.get_u32();
        if magic != FRAME_MAGIC {
            return Err(ProtocolError::DeserializationFailed(format!(
                "invalid magic: {magic:08x}"
            )));
        }

        let len = data.get_u32() as usize;
        if len > MAX_FRAME_PAYLOAD {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_PAYLOAD,
            });
        }
        if data.len() < len {
            return Err(ProtocolError::DeserializationFailed(
                "incomplete frame".to_string(),
            ));
        }

        bincode::deserialize(&data.slice(..len))
            .map_err(|e| ProtocolError::DeserializationFailed(e.to_string()))
    }

    /// Checks whether `data` starts with a complete frame.
    ///
    /// Returns the frame size if complete, `None` if more bytes are needed,
    /// and an error as soon as the header announces an oversized payload.
    pub fn frame_size(data: &[u8]) -> ProtocolResult<Option<usize>> {
        if data.len() < HEADER_SIZE {
            return Ok(None);
        }

        let len = u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize;
        if len > MAX_FRAME_PAYLOAD {
            return Err(ProtocolError::FrameTooLarge {
                size: len,
                max: MAX_FRAME_PAYLOAD,
            });
        }

        let total = HEADER_SIZE + len;
        Ok((data.len() >= total).then_some(total))
    }
}

#[cfg(test)]
mod tests {
    use super::frame::{self, FRAME_MAGIC, HEADER_SIZE};
    use super::*;
    use crate::error::ProtocolError;
    use bytes::{BufMut, Bytes, BytesMut};
    use memkeep_common::MAX_FRAME_PAYLOAD;

    #[test]
    fn test_frame_layout() {
        let encoded = frame::encode(&Request::Defragment).unwrap();
        assert_eq!(&encoded[..4], &FRAME_MAGIC.to_be_bytes());
        let len = u32::from_be_bytes([encoded[4], encoded[5], encoded[6], encoded[7]]) as usize;
        assert_eq!(encoded.len(), HEADER_SIZE + len);
    }

    #[test]
    fn test_request_round_trip() {
        let request = Request::Set {
            id: BlockId::new(3),
            data: b"Hola\0".to_vec(),
        };
        let encoded = frame::encode(&request).unwrap();
        let decoded: Request = frame::decode(encoded).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_frame_size_waits_for_complete_frame() {
        let encoded = frame::encode(&Response::Data { bytes: vec![7; 32] }).unwrap();

        assert_eq!(frame::frame_size(&encoded[..3]).unwrap(), None);
        assert_eq!(frame::frame_size(&encoded[..HEADER_SIZE + 1]).unwrap(), None);
        assert_eq!(frame::frame_size(&encoded).unwrap(), Some(encoded.len()));

        let mut two = BytesMut::new();
        two.extend_from_slice(&encoded);
        two.extend_from_slice(&encoded);
        assert_eq!(frame::frame_size(&two).unwrap(), Some(encoded.len()));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(0xDEAD_BEEF);
        buf.put_u32(0);
        let result: Result<Request, _> = frame::decode(buf.freeze());
        assert!(matches!(result, Err(ProtocolError::DeserializationFailed(_))));
    }

    #[test]
    fn test_oversized_header_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(FRAME_MAGIC);
        buf.put_u32(MAX_FRAME_PAYLOAD as u32 + 1);
        assert!(matches!(
            frame::frame_size(&buf),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let encoded = frame::encode(&Request::Stats).unwrap();
        let truncated = Bytes::copy_from_slice(&encoded[..HEADER_SIZE - 1]);
        let result: Result<Request, _> = frame::decode(truncated);
        assert!(result.is_err());
    }

    #[test]
    fn test_max_data_len_fits_in_frame() {
        let response = Response::Data {
            bytes: vec![0; frame::MAX_DATA_LEN],
        };
        let encoded = frame::encode(&response).unwrap();
        assert_eq!(encoded.len(), HEADER_SIZE + MAX_FRAME_PAYLOAD);

        let response = Response::Data {
            bytes: vec![0; frame::MAX_DATA_LEN + 1],
        };
        assert!(matches!(
            frame::encode(&response),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_request_names() {
        assert_eq!(Request::Create { size: 1 }.name(), "create");
        assert_eq!(Request::Defragment.name(), "defragment");
    }
}
