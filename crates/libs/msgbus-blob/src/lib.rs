mod error;
mod ids;
mod incoming;
mod info;
mod io;
mod manipulator;
mod outgoing;
mod rangeset;
mod wire;

pub use error::BlobError;
pub use ids::{BlobIdSequence, SourceBlobId, TargetBlobId};
pub use incoming::{PendingIncoming, RESEND_INTERVAL};
pub use info::{BlobInfo, PrepareStatus};
pub use io::{BufferSourceBlobIo, BufferTargetBlobIo, SourceBlobIo, TargetBlobIo};
pub use manipulator::{
    BlobManipulator, BlobManipulatorConfig, SendFn, TargetIoGetter, DEFAULT_SIZE_CAP_BYTES,
};
pub use outgoing::{fragment_payload_size, PendingOutgoing, DEFAULT_LINGER};
pub use rangeset::{RangeOp, RangeSet};
pub use wire::{
    decode_fragment, decode_prepare, decode_resend, encode_fragment, encode_prepare, encode_resend,
    FragmentHeader, PreparePayload, ResendRequest, FRAGMENT_HEADER_SIZE, PREPARE_PAYLOAD_SIZE,
    RESEND_PAYLOAD_SIZE,
};
