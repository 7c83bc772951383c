use std::net::Ipv4Addr;

use bytes::{Buf, BufMut};

use crate::dns_name::{parse_domain_name, write_domain_name};
use crate::error::{ensure_len, DnsError};

/// DNS Question Section
/// Format: QNAME + QTYPE (2 bytes) + QCLASS (2 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: String, // Domain name (e.g., "example.com")
    pub qtype: u16,   // Query type (A, AAAA, CNAME, etc.)
    pub qclass: u16,  // Query class (usually IN for Internet)
}

/// DNS Answer/Resource Record Section
/// Format: NAME + TYPE (2 bytes) + CLASS (2 bytes) + TTL (4 bytes) + RDLENGTH (2 bytes) + RDATA
///
/// RDATA is kept verbatim; its length on the wire is always `rdata.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsAnswer {
    pub name: String,   // Domain name
    pub rtype: u16,     // Record type (A, AAAA, CNAME, etc.)
    pub rclass: u16,    // Record class (usually IN for Internet)
    pub ttl: u32,       // Time to live in seconds
    pub rdata: Vec<u8>, // Resource data (format depends on record type)
}

/// Common DNS record types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    A = 1,     // IPv4 address
    NS = 2,    // Name server
    CNAME = 5, // Canonical name
    SOA = 6,   // Start of authority
    PTR = 12,  // Pointer record
    MX = 15,   // Mail exchange
    TXT = 16,  // Text record
    AAAA = 28, // IPv6 address
}

impl RecordType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(RecordType::A),
            2 => Some(RecordType::NS),
            5 => Some(RecordType::CNAME),
            6 => Some(RecordType::SOA),
            12 => Some(RecordType::PTR),
            15 => Some(RecordType::MX),
            16 => Some(RecordType::TXT),
            28 => Some(RecordType::AAAA),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

/// Common DNS classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordClass {
    IN = 1, // Internet
    CS = 2, // CSNET (obsolete)
    CH = 3, // CHAOS
    HS = 4, // Hesiod
}

impl RecordClass {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(RecordClass::IN),
            2 => Some(RecordClass::CS),
            3 => Some(RecordClass::CH),
            4 => Some(RecordClass::HS),
            _ => None,
        }
    }

    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

impl DnsQuestion {
    pub fn new(name: impl Into<String>, qtype: RecordType, qclass: RecordClass) -> Self {
        DnsQuestion {
            name: name.into(),
            qtype: qtype.to_u16(),
            qclass: qclass.to_u16(),
        }
    }

    /// Parse a DNS question from bytes starting at the given offset
    /// Returns the question and the new offset after parsing
    pub fn from_bytes(bytes: &[u8], offset: usize) -> Result<(Self, usize), DnsError> {
        let (name, new_offset) = parse_domain_name(bytes, offset)?;

        ensure_len(bytes, new_offset, 4)?;
        let mut buf = &bytes[new_offset..new_offset + 4];

        Ok((
            DnsQuestion {
                name,
                qtype: buf.get_u16(),
                qclass: buf.get_u16(),
            },
            new_offset + 4,
        ))
    }

    /// Write the question with its name in uncompressed form
    pub fn write<B: BufMut>(&self, buf: &mut B) -> Result<(), DnsError> {
        write_domain_name(&self.name, buf)?;
        buf.put_u16(self.qtype);
        buf.put_u16(self.qclass);
        Ok(())
    }
}

impl DnsAnswer {
    /// Parse a DNS answer/resource record from bytes starting at the given offset
    /// Returns the answer and the new offset after parsing
    pub fn from_bytes(bytes: &[u8], offset: usize) -> Result<(Self, usize), DnsError> {
        let (name, new_offset) = parse_domain_name(bytes, offset)?;

        ensure_len(bytes, new_offset, 10)?;
        let mut buf = &bytes[new_offset..new_offset + 10];
        let rtype = buf.get_u16();
        let rclass = buf.get_u16();
        let ttl = buf.get_u32();
        let rdlength = usize::from(buf.get_u16());

        let data_offset = new_offset + 10;
        ensure_len(bytes, data_offset, rdlength)?;
        let rdata = bytes[data_offset..data_offset + rdlength].to_vec();

        Ok((
            DnsAnswer {
                name,
                rtype,
                rclass,
                ttl,
                rdata,
            },
            data_offset + rdlength,
        ))
    }

    pub fn write<B: BufMut>(&self, buf: &mut B) -> Result<(), DnsError> {
        let rdlength = self.rdlength()?;

        write_domain_name(&self.name, buf)?;
        buf.put_u16(self.rtype);
        buf.put_u16(self.rclass);
        buf.put_u32(self.ttl);
        buf.put_u16(rdlength);
        buf.put_slice(&self.rdata);
        Ok(())
    }

    /// Create a new DNS answer with the given parameters
    pub fn new(name: String, rtype: u16, rclass: u16, ttl: u32, rdata: Vec<u8>) -> Self {
        DnsAnswer {
            name,
            rtype,
            rclass,
            ttl,
            rdata,
        }
    }

    /// Create an A record (IPv4 address) answer
    pub fn new_a_record(name: String, ttl: u32, ip: Ipv4Addr) -> Self {
        Self::new(
            name,
            RecordType::A.to_u16(),
            RecordClass::IN.to_u16(),
            ttl,
            ip.octets().to_vec(),
        )
    }

    /// RDLENGTH as written on the wire
    pub fn rdlength(&self) -> Result<u16, DnsError> {
        u16::try_from(self.rdata.len()).map_err(|_| DnsError::RdataTooLong(self.rdata.len()))
    }

    /// Address carried by an A record, if this is one
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        if RecordType::from_u16(self.rtype) != Some(RecordType::A) {
            return None;
        }
        let octets: [u8; 4] = self.rdata.as_slice().try_into().ok()?;
        Some(Ipv4Addr::from(octets))
    }
}
