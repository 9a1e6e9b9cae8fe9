//! Endpoint / host / message identifiers and the small enumerations that
//! travel in every frame header.

use std::fmt;

use crate::WireError;

/// A bus endpoint identifier. `0` is the broadcast / anonymous sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointId(pub u64);

impl EndpointId {
    pub const BROADCAST: EndpointId = EndpointId(0);

    pub fn is_broadcast(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EndpointId {
    fn from(v: u64) -> Self {
        EndpointId(v)
    }
}

/// Identifies the host a process instance runs on. Combined with a minor
/// value it seeds a router's configured id range: `base = (host_id << 32) | minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostId(pub u32);

/// A per-process nonce. Lets a router detect that a peer restarted and
/// invalidate cached subscription state for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessInstanceId(pub u32);

/// Sender-chosen sequence number, copied from request into response.
pub type SequenceNo = u32;

/// Accumulated queue time, in quarter-seconds, clamped at `i8::MAX`.
pub type AgeQuarterSeconds = i8;

/// Hop count, incremented once per router traversal.
pub type HopCount = i8;

/// Maximum hop count before a message is dropped.
pub const MAX_HOP_COUNT: HopCount = 64;

/// Message delivery priority. Ordered from least to most urgent; the
/// priority queue in `msgbus-storage` serves higher variants first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum MessagePriority {
    Idle = 0,
    Low = 1,
    Normal = 2,
    High = 3,
    Critical = 4,
}

impl MessagePriority {
    /// Age threshold (quarter-seconds) past which a message of this
    /// priority is considered stale and dropped. `None` means "never,
    /// until the age counter itself clamps".
    pub fn stale_threshold(self) -> Option<AgeQuarterSeconds> {
        match self {
            MessagePriority::Idle => Some(40),
            MessagePriority::Low => Some(80),
            MessagePriority::Normal => Some(120),
            MessagePriority::High => None,
            MessagePriority::Critical => None,
        }
    }

    pub fn is_stale(self, age: AgeQuarterSeconds) -> bool {
        matches!(self.stale_threshold(), Some(limit) if age > limit)
    }

    pub fn from_u8(v: u8) -> Result<Self, WireError> {
        match v {
            0 => Ok(MessagePriority::Idle),
            1 => Ok(MessagePriority::Low),
            2 => Ok(MessagePriority::Normal),
            3 => Ok(MessagePriority::High),
            4 => Ok(MessagePriority::Critical),
            other => Err(WireError::InvalidPriority(other)),
        }
    }
}

impl Default for MessagePriority {
    fn default() -> Self {
        MessagePriority::Normal
    }
}

bitflags::bitflags! {
    /// Bits carried in every header's `crypto_flags` byte. The hash/signing
    /// primitives themselves are supplied by the embedding context — these bits are opaque markers here.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CryptoFlags: u8 {
        const ASYMMETRIC = 0b0000_0001;
        const SIGNED_HEADER = 0b0000_0010;
        const SIGNED_CONTENT = 0b0000_0100;
    }
}

/// How a connection reaches its peer. Reported in `topoRutrCn` responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    /// Same-process, e.g. an endpoint created in-process with the router.
    InProcess,
    /// Local interprocess transport (Unix socket, named pipe, ...).
    LocalInterprocess,
    /// Remote transport (TCP, UDP, ...).
    Remote,
}

/// Broad shape of the address a connection/acceptor was configured with.
/// Informational only; routing never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    Unspecified,
    Local,
    Ipv4,
    Ipv6,
}

/// Wire protocol family underneath a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    InProcess,
    Tcp,
    Udp,
    LocalStream,
}

/// Short ASCII token (≤ 10 bytes), used for both the class and method parts
/// of a [`MessageId`]. Stack-allocated: these compare and hash constantly
/// on the router's hot path, and none of them are long enough to be worth
/// heap allocation.
#[derive(Clone, Copy, Eq)]
pub struct ShortId {
    buf: [u8; ShortId::CAPACITY],
    len: u8,
}

impl ShortId {
    pub const CAPACITY: usize = 10;

    pub fn new(s: &str) -> Result<Self, WireError> {
        let bytes = s.as_bytes();
        if bytes.len() > Self::CAPACITY {
            return Err(WireError::ShortIdTooLong(s.to_string()));
        }
        if !bytes.is_ascii() {
            return Err(WireError::ShortIdNotAscii(s.to_string()));
        }
        let mut buf = [0u8; Self::CAPACITY];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(ShortId {
            buf,
            len: bytes.len() as u8,
        })
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or_default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }
}

impl PartialEq for ShortId {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl std::hash::Hash for ShortId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl fmt::Debug for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ShortId {
    type Error = WireError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        ShortId::new(s)
    }
}

/// A `(class, method)` pair identifying a message's meaning. Equality is by
/// both components. Ids with class `"eagiMsgBus"` are special: control-plane
/// messages, never subject to subscriber allow/block filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId {
    pub class: ShortId,
    pub method: ShortId,
}

/// Reserved class for bus-internal control messages.
pub const SPECIAL_CLASS: &str = "eagiMsgBus";

impl MessageId {
    pub fn new(class: &str, method: &str) -> Result<Self, WireError> {
        Ok(MessageId {
            class: ShortId::new(class)?,
            method: ShortId::new(method)?,
        })
    }

    /// Messages of the reserved control-plane class are never filtered.
    pub fn is_special(&self) -> bool {
        self.class.as_str() == SPECIAL_CLASS
    }

    pub fn control(method: &str) -> Self {
        MessageId::new(SPECIAL_CLASS, method).expect("control method ids are short ascii literals")
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.method)
    }
}
