//! Inner payload layouts carried inside `"blobFrgmnt"`, `"blobResend"` and
//! `"blobPrpare"` control messages. Packed the same way the
//! outer frame header is: fixed-width big-endian fields, no generic
//! serializer.

use crate::error::BlobError;
use crate::ids::{SourceBlobId, TargetBlobId};

/// `(source_blob_id, target_blob_id, offset, total_size, options)` header
/// immediately followed by the fragment's data bytes.
pub const FRAGMENT_HEADER_SIZE: usize = 4 + 4 + 8 + 8 + 2;

pub struct FragmentHeader {
    pub source_blob_id: SourceBlobId,
    pub target_blob_id: TargetBlobId,
    pub offset: i64,
    pub total_size: i64,
    pub options: u16,
}

pub fn encode_fragment(header: &FragmentHeader, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAGMENT_HEADER_SIZE + data.len());
    out.extend_from_slice(&header.source_blob_id.0.to_be_bytes());
    out.extend_from_slice(&header.target_blob_id.0.to_be_bytes());
    out.extend_from_slice(&header.offset.to_be_bytes());
    out.extend_from_slice(&header.total_size.to_be_bytes());
    out.extend_from_slice(&header.options.to_be_bytes());
    out.extend_from_slice(data);
    out
}

pub fn decode_fragment(bytes: &[u8]) -> Result<(FragmentHeader, &[u8]), BlobError> {
    if bytes.len() < FRAGMENT_HEADER_SIZE {
        return Err(BlobError::PayloadTooShort {
            need: FRAGMENT_HEADER_SIZE,
            got: bytes.len(),
        });
    }
    let mut pos = 0usize;
    let source_blob_id = SourceBlobId(read_u32(bytes, &mut pos));
    let target_blob_id = TargetBlobId(read_u32(bytes, &mut pos));
    let offset = read_i64(bytes, &mut pos);
    let total_size = read_i64(bytes, &mut pos);
    let options = read_u16(bytes, &mut pos);
    let data = &bytes[pos..];

    if offset < 0 || total_size <= 0 || offset >= total_size {
        return Err(BlobError::InvalidFragmentRange {
            offset,
            len: data.len(),
            total_size,
        });
    }
    if data.len() as i64 > total_size - offset {
        return Err(BlobError::InvalidFragmentRange {
            offset,
            len: data.len(),
            total_size,
        });
    }

    Ok((
        FragmentHeader {
            source_blob_id,
            target_blob_id,
            offset,
            total_size,
            options,
        },
        data,
    ))
}

/// `(source_blob_id, begin, end)`; `end == 0` means "to total size".
pub struct ResendRequest {
    pub source_blob_id: SourceBlobId,
    pub begin: u64,
    pub end: u64,
}

pub const RESEND_PAYLOAD_SIZE: usize = 8 + 8 + 8;

pub fn encode_resend(req: &ResendRequest) -> Vec<u8> {
    let mut out = Vec::with_capacity(RESEND_PAYLOAD_SIZE);
    out.extend_from_slice(&(req.source_blob_id.0 as u64).to_be_bytes());
    out.extend_from_slice(&req.begin.to_be_bytes());
    out.extend_from_slice(&req.end.to_be_bytes());
    out
}

pub fn decode_resend(bytes: &[u8]) -> Result<ResendRequest, BlobError> {
    if bytes.len() < RESEND_PAYLOAD_SIZE {
        return Err(BlobError::PayloadTooShort {
            need: RESEND_PAYLOAD_SIZE,
            got: bytes.len(),
        });
    }
    let mut pos = 0usize;
    let source_blob_id = SourceBlobId(read_u64(bytes, &mut pos) as u32);
    let begin = read_u64(bytes, &mut pos);
    let end = read_u64(bytes, &mut pos);
    Ok(ResendRequest {
        source_blob_id,
        begin,
        end,
    })
}

/// `(target_blob_id, progress)`.
pub struct PreparePayload {
    pub target_blob_id: TargetBlobId,
    pub progress: f32,
}

pub const PREPARE_PAYLOAD_SIZE: usize = 8 + 4;

pub fn encode_prepare(payload: &PreparePayload) -> Vec<u8> {
    let mut out = Vec::with_capacity(PREPARE_PAYLOAD_SIZE);
    out.extend_from_slice(&(payload.target_blob_id.0 as u64).to_be_bytes());
    out.extend_from_slice(&payload.progress.to_be_bytes());
    out
}

pub fn decode_prepare(bytes: &[u8]) -> Result<PreparePayload, BlobError> {
    if bytes.len() < PREPARE_PAYLOAD_SIZE {
        return Err(BlobError::PayloadTooShort {
            need: PREPARE_PAYLOAD_SIZE,
            got: bytes.len(),
        });
    }
    let mut pos = 0usize;
    let target_blob_id = TargetBlobId(read_u64(bytes, &mut pos) as u32);
    let progress = f32::from_be_bytes(bytes[pos..pos + 4].try_into().unwrap());
    Ok(PreparePayload {
        target_blob_id,
        progress,
    })
}

fn read_u16(bytes: &[u8], pos: &mut usize) -> u16 {
    let v = u16::from_be_bytes(bytes[*pos..*pos + 2].try_into().unwrap());
    *pos += 2;
    v
}

fn read_u32(bytes: &[u8], pos: &mut usize) -> u32 {
    let v = u32::from_be_bytes(bytes[*pos..*pos + 4].try_into().unwrap());
    *pos += 4;
    v
}

fn read_u64(bytes: &[u8], pos: &mut usize) -> u64 {
    let v = u64::from_be_bytes(bytes[*pos..*pos + 8].try_into().unwrap());
    *pos += 8;
    v
}

fn read_i64(bytes: &[u8], pos: &mut usize) -> i64 {
    read_u64(bytes, pos) as i64
}
