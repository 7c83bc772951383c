use std::io;

use thiserror::Error;

/// Errors raised while decoding, encoding or forwarding DNS packets
#[derive(Error, Debug)]
pub enum DnsError {
    #[error("truncated packet: needed {needed} bytes, {available} available")]
    TruncatedPacket { needed: usize, available: usize },

    #[error("invalid compression pointer at offset {offset} to offset {target}")]
    InvalidCompressionPointer { offset: usize, target: usize },

    #[error("invalid label at offset {0}")]
    InvalidLabel(usize),

    #[error("label too long: {0}")]
    LabelTooLong(String),

    #[error("rdata of {0} bytes does not fit a 16-bit length")]
    RdataTooLong(usize),

    #[error("section already holds 65535 records")]
    SectionFull,

    #[error("upstream transport failure: {0}")]
    TransportFailure(#[from] io::Error),
}

/// Fail with `TruncatedPacket` unless `bytes[offset..offset + len]` is in bounds
pub fn ensure_len(bytes: &[u8], offset: usize, len: usize) -> Result<(), DnsError> {
    let needed = offset.saturating_add(len);
    if needed > bytes.len() {
        return Err(DnsError::TruncatedPacket {
            needed,
            available: bytes.len(),
        });
    }
    Ok(())
}
