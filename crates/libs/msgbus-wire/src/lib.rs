pub mod codec;
pub mod content;
mod error;
mod header;
mod ids;
mod message;

pub use codec::{
    decode_frame, decode_frame_owned, decode_message_id, encode_frame, encode_message_id,
    encode_view, MIN_HEADER_SIZE,
};
pub use content::{ContentCodec, MsgPackCodec};
pub use error::WireError;
pub use header::MessageHeader;
pub use ids::{
    AddressKind, AgeQuarterSeconds, ConnectionKind, CryptoFlags, EndpointId, HopCount, HostId,
    MessageId, MessagePriority, ProcessInstanceId, Protocol, SequenceNo, ShortId, MAX_HOP_COUNT,
    SPECIAL_CLASS,
};
pub use message::{MessageView, StoredMessage};
