use bytes::BufMut;

use crate::error::{ensure_len, DnsError};

/// Longest label a length octet can describe
pub const MAX_LABEL_LEN: usize = 63;

/// Upper bound on chained compression pointers within one name
const MAX_POINTER_DEPTH: usize = 16;

const POINTER_MASK: u8 = 0xC0;

/// Parse a domain name from DNS message format
/// Supports DNS name compression (pointers) into the same packet.
/// Returns the dotted name (empty for the root) and the offset just past
/// the name as it appears at `offset`; a pointer always ends a name, so
/// the returned offset sits two bytes after it.
pub fn parse_domain_name(packet: &[u8], offset: usize) -> Result<(String, usize), DnsError> {
    let mut labels = Vec::new();
    let next_offset = read_labels(packet, offset, 0, &mut labels)?;

    Ok((labels.join("."), next_offset))
}

/// Collect labels starting at `start`, following pointers recursively.
/// A pointer must target an offset strictly before `start`, so every hop
/// moves backwards through the packet and decoding always terminates.
fn read_labels(
    packet: &[u8],
    start: usize,
    depth: usize,
    labels: &mut Vec<String>,
) -> Result<usize, DnsError> {
    let mut offset = start;

    loop {
        ensure_len(packet, offset, 1)?;
        let length = packet[offset];

        match length & POINTER_MASK {
            POINTER_MASK => {
                ensure_len(packet, offset, 2)?;
                let target = usize::from(u16::from_be_bytes([length & 0x3F, packet[offset + 1]]));

                if target >= start || depth >= MAX_POINTER_DEPTH {
                    return Err(DnsError::InvalidCompressionPointer { offset, target });
                }

                read_labels(packet, target, depth + 1, labels)?;
                return Ok(offset + 2);
            }
            0 => {}
            // 0b01 and 0b10 prefixes are reserved label types
            _ => return Err(DnsError::InvalidLabel(offset)),
        }

        if length == 0 {
            return Ok(offset + 1);
        }

        let label_start = offset + 1;
        let label_len = usize::from(length);
        ensure_len(packet, label_start, label_len)?;

        let label = std::str::from_utf8(&packet[label_start..label_start + label_len])
            .map_err(|_| DnsError::InvalidLabel(offset))?;
        labels.push(label.to_string());

        offset = label_start + label_len;
    }
}

/// Write a domain name in DNS message format
/// Format: length-prefixed labels terminated with a null byte
/// Example: "example.com" -> [7]example[3]com[0]
pub fn write_domain_name<B: BufMut>(name: &str, buf: &mut B) -> Result<(), DnsError> {
    if let Some(label) = name.split('.').find(|label| label.len() > MAX_LABEL_LEN) {
        return Err(DnsError::LabelTooLong(label.to_string()));
    }

    for label in name.split('.').filter(|label| !label.is_empty()) {
        buf.put_u8(label.len() as u8);
        buf.put_slice(label.as_bytes());
    }
    buf.put_u8(0);

    Ok(())
}
