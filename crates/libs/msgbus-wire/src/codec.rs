//! Binary frame codec for the control header.
//!
//! Must stay bit-stable between any two interoperating routers/endpoints,
//! so the header is hand-packed field by field rather than routed through
//! a generic serde binary format — the same choice `src/message/wire.rs`
//! and `styrene-mesh::wire` make for their own fixed headers.

use crate::{
    AgeQuarterSeconds, CryptoFlags, EndpointId, HopCount, MessageHeader, MessageId, MessagePriority,
    MessageView, ShortId, StoredMessage, WireError,
};

/// Smallest frame that can carry a header with empty content: two 1-byte
/// length prefixes + up to 20 bytes of short-id payload + 8+8+8+4+1+1+1+1.
pub const MIN_HEADER_SIZE: usize = 2 + 2 * ShortId::CAPACITY + 8 + 8 + 8 + 4 + 1 + 1 + 1 + 1;

fn push_short_id(out: &mut Vec<u8>, id: &ShortId) {
    out.push(id.as_bytes().len() as u8);
    out.extend_from_slice(id.as_bytes());
}

fn read_short_id(bytes: &[u8], pos: &mut usize) -> Result<ShortId, WireError> {
    if *pos >= bytes.len() {
        return Err(WireError::FrameTooShort {
            got: bytes.len(),
            need: *pos + 1,
        });
    }
    let len = bytes[*pos] as usize;
    *pos += 1;
    if *pos + len > bytes.len() {
        return Err(WireError::FrameTooShort {
            got: bytes.len(),
            need: *pos + len,
        });
    }
    let text = std::str::from_utf8(&bytes[*pos..*pos + len])
        .map_err(|e| WireError::Content(e.to_string()))?;
    *pos += len;
    ShortId::new(text)
}

/// Encodes `header` followed by `content` into a single frame buffer.
pub fn encode_frame(header: &MessageHeader, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(MIN_HEADER_SIZE + content.len());
    push_short_id(&mut out, &header.msg_id.class);
    push_short_id(&mut out, &header.msg_id.method);
    out.extend_from_slice(&header.source_id.0.to_be_bytes());
    out.extend_from_slice(&header.target_id.0.to_be_bytes());
    out.extend_from_slice(&header.serializer_id.to_be_bytes());
    out.extend_from_slice(&header.sequence_no.to_be_bytes());
    out.push(header.hop_count as u8);
    out.push(header.age_quarter_seconds as u8);
    out.push(header.priority as u8);
    out.push(header.crypto_flags.bits());
    out.extend_from_slice(content);
    out
}

/// Decodes a frame, returning the header and a borrowed slice over the
/// remaining content. A frame that fails to decode is the caller's
/// responsibility to count-and-drop: this function never
/// panics on malformed input, only returns `Err`.
pub fn decode_frame(bytes: &[u8]) -> Result<(MessageHeader, &[u8]), WireError> {
    let mut pos = 0usize;
    let class = read_short_id(bytes, &mut pos)?;
    let method = read_short_id(bytes, &mut pos)?;

    let need = pos + 8 + 8 + 8 + 4 + 1 + 1 + 1 + 1;
    if bytes.len() < need {
        return Err(WireError::FrameTooShort {
            got: bytes.len(),
            need,
        });
    }

    let source_id = EndpointId(read_u64(bytes, &mut pos));
    let target_id = EndpointId(read_u64(bytes, &mut pos));
    let serializer_id = read_u64(bytes, &mut pos);
    let sequence_no = read_u32(bytes, &mut pos);
    let hop_count = bytes[pos] as HopCount;
    pos += 1;
    let age_quarter_seconds = bytes[pos] as AgeQuarterSeconds;
    pos += 1;
    let priority = MessagePriority::from_u8(bytes[pos])?;
    pos += 1;
    let crypto_flags =
        CryptoFlags::from_bits(bytes[pos]).ok_or(WireError::InvalidCryptoFlags(bytes[pos]))?;
    pos += 1;

    let header = MessageHeader {
        msg_id: MessageId { class, method },
        source_id,
        target_id,
        serializer_id,
        sequence_no,
        hop_count,
        age_quarter_seconds,
        priority,
        crypto_flags,
    };
    Ok((header, &bytes[pos..]))
}

/// Encodes a bare `(class, method)` pair the same way it rides inside a
/// frame header. Used for control-message payloads that carry a message id
/// as their content.
pub fn encode_message_id(msg_id: &MessageId) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 * ShortId::CAPACITY + 2);
    push_short_id(&mut out, &msg_id.class);
    push_short_id(&mut out, &msg_id.method);
    out
}

/// Decodes a payload produced by [`encode_message_id`].
pub fn decode_message_id(bytes: &[u8]) -> Result<MessageId, WireError> {
    let mut pos = 0usize;
    let class = read_short_id(bytes, &mut pos)?;
    let method = read_short_id(bytes, &mut pos)?;
    Ok(MessageId { class, method })
}

/// Convenience wrapper producing an owned [`StoredMessage`].
pub fn decode_frame_owned(bytes: &[u8]) -> Result<StoredMessage, WireError> {
    let (header, content) = decode_frame(bytes)?;
    Ok(StoredMessage::new(header, content.to_vec()))
}

pub fn encode_view(view: &MessageView<'_>) -> Vec<u8> {
    encode_frame(view.header, view.content)
}

fn read_u64(bytes: &[u8], pos: &mut usize) -> u64 {
    let mut arr = [0u8; 8];
    arr.copy_from_slice(&bytes[*pos..*pos + 8]);
    *pos += 8;
    u64::from_be_bytes(arr)
}

fn read_u32(bytes: &[u8], pos: &mut usize) -> u32 {
    let mut arr = [0u8; 4];
    arr.copy_from_slice(&bytes[*pos..*pos + 4]);
    *pos += 4;
    u32::from_be_bytes(arr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> MessageHeader {
        let mut header =
            MessageHeader::new(MessageId::new("app", "ping").unwrap(), EndpointId(10), EndpointId(11));
        header.sequence_no = 42;
        header.hop_count = 3;
        header.age_quarter_seconds = 12;
        header.priority = MessagePriority::High;
        header.crypto_flags = CryptoFlags::SIGNED_HEADER;
        header
    }

    #[test]
    fn roundtrip_with_content() {
        let header = sample_header();
        let content = b"hello bus";
        let frame = encode_frame(&header, content);
        let (decoded, decoded_content) = decode_frame(&frame).expect("decode");
        assert_eq!(decoded, header);
        assert_eq!(decoded_content, content);
    }

    #[test]
    fn roundtrip_empty_content() {
        let header = sample_header();
        let frame = encode_frame(&header, &[]);
        let (decoded, decoded_content) = decode_frame(&frame).expect("decode");
        assert_eq!(decoded, header);
        assert!(decoded_content.is_empty());
    }

    #[test]
    fn truncated_frame_is_rejected_not_panicking() {
        // A class/method pair at the full 10-byte `ShortId` capacity so the
        // header itself is exactly `MIN_HEADER_SIZE` bytes long (shorter
        // ids, e.g. "app"/"ping", make for a shorter header and either pass
        // the loop too early or index past the frame's actual length).
        let mut header = MessageHeader::new(
            MessageId::new("1234567890", "abcdefghij").unwrap(),
            EndpointId(10),
            EndpointId(11),
        );
        header.sequence_no = 42;
        header.hop_count = 3;
        header.age_quarter_seconds = 12;
        header.priority = MessagePriority::High;
        header.crypto_flags = CryptoFlags::SIGNED_HEADER;

        let content = b"xyz";
        let frame = encode_frame(&header, content);
        let header_len = frame.len() - content.len();
        assert_eq!(header_len, MIN_HEADER_SIZE);

        for cut in 0..header_len {
            assert!(decode_frame(&frame[..cut]).is_err(), "cut={cut} should be too short to decode");
        }
        for cut in header_len..=frame.len() {
            assert!(decode_frame(&frame[..cut]).is_ok(), "cut={cut} should decode once the header is complete");
        }
    }

    #[test]
    fn broadcast_target_roundtrips() {
        let header = MessageHeader::new(
            MessageId::control("ping"),
            EndpointId(7),
            EndpointId::BROADCAST,
        );
        let frame = encode_frame(&header, &[]);
        let (decoded, _) = decode_frame(&frame).unwrap();
        assert!(decoded.is_broadcast());
    }

    #[test]
    fn message_id_payload_roundtrips() {
        let msg_id = MessageId::new("app", "sub").unwrap();
        let bytes = encode_message_id(&msg_id);
        assert_eq!(decode_message_id(&bytes).unwrap(), msg_id);
    }
}

