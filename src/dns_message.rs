use bytes::{Bytes, BytesMut};

use crate::dns_header::{
    DnsFlags, DnsHeader, HEADER_LEN, OPCODE_QUERY, RCODE_NOT_IMPLEMENTED, RCODE_NO_ERROR,
    RCODE_SERVER_FAILURE,
};
use crate::dns_question_and_answer::{DnsAnswer, DnsQuestion};
use crate::error::DnsError;

/// A DNS message: header plus the question and answer sections.
/// Authority and additional records are never materialised, so their counts
/// are only readable on a parsed message and are written as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsMessage {
    header: DnsHeader,
    questions: Vec<DnsQuestion>,
    answers: Vec<DnsAnswer>,
}

impl DnsMessage {
    /// Start a message from a header; all section counts are reset and
    /// then follow `add_question`/`add_answer`
    pub fn new(header: DnsHeader) -> Self {
        DnsMessage {
            header: DnsHeader {
                question_count: 0,
                answer_count: 0,
                authority_count: 0,
                additional_count: 0,
                ..header
            },
            questions: Vec::new(),
            answers: Vec::new(),
        }
    }

    /// Parse the request from the buffer.
    /// Decodes `question_count` questions then `answer_count` answers; the
    /// authority and additional counts are kept in the header only.
    pub fn parse(buf: &[u8]) -> Result<Self, DnsError> {
        let header = DnsHeader::from_bytes(buf)?;

        let mut offset = HEADER_LEN;

        let mut questions = Vec::with_capacity(usize::from(header.question_count));
        for _ in 0..header.question_count {
            let (question, new_offset) = DnsQuestion::from_bytes(buf, offset)?;
            questions.push(question);
            offset = new_offset;
        }

        let mut answers = Vec::with_capacity(usize::from(header.answer_count));
        for _ in 0..header.answer_count {
            let (answer, new_offset) = DnsAnswer::from_bytes(buf, offset)?;
            answers.push(answer);
            offset = new_offset;
        }

        Ok(DnsMessage {
            header,
            questions,
            answers,
        })
    }

    pub fn add_question(&mut self, question: DnsQuestion) -> Result<(), DnsError> {
        self.header.question_count = self
            .header
            .question_count
            .checked_add(1)
            .ok_or(DnsError::SectionFull)?;
        self.questions.push(question);
        Ok(())
    }

    pub fn add_answer(&mut self, answer: DnsAnswer) -> Result<(), DnsError> {
        self.header.answer_count = self
            .header
            .answer_count
            .checked_add(1)
            .ok_or(DnsError::SectionFull)?;
        self.answers.push(answer);
        Ok(())
    }

    pub fn header(&self) -> &DnsHeader {
        &self.header
    }

    pub fn questions(&self) -> &[DnsQuestion] {
        &self.questions
    }

    pub fn answers(&self) -> &[DnsAnswer] {
        &self.answers
    }

    pub fn into_answers(self) -> Vec<DnsAnswer> {
        self.answers
    }

    /// Build the complete DNS packet: header, then questions and answers
    /// in insertion order
    pub fn to_bytes(&self) -> Result<Bytes, DnsError> {
        let mut buf = BytesMut::with_capacity(512);

        DnsHeader {
            authority_count: 0,
            additional_count: 0,
            ..self.header
        }
        .write(&mut buf);

        for question in &self.questions {
            question.write(&mut buf)?;
        }

        for answer in &self.answers {
            answer.write(&mut buf)?;
        }

        Ok(buf.freeze())
    }
}

/// Create response header based on request header.
/// RCODE is 0 for a standard query and 4 (not implemented) for any other opcode.
pub fn create_response_header(request_header: &DnsHeader) -> DnsHeader {
    let request_flags = request_header.flags;

    let response_flags = DnsFlags {
        qr: true,                                  // This is a response
        opcode: request_flags.opcode,              // Echo opcode
        aa: false,                                 // Not authoritative
        tc: false,                                 // Not truncated
        rd: request_flags.rd,                      // Echo recursion desired
        ra: false,                                 // Recursion not available
        z: 0,                                      // Reserved
        rcode: if request_flags.opcode == OPCODE_QUERY {
            RCODE_NO_ERROR
        } else {
            RCODE_NOT_IMPLEMENTED
        },
    };

    DnsHeader {
        id: request_header.id,
        flags: response_flags,
        ..DnsHeader::default()
    }
}

/// Assemble the DNS response: the request's questions echoed back
/// followed by the answers. A standard query whose forwarding was aborted
/// without producing any answer is reported as a server failure.
pub fn build_response(
    request: &DnsMessage,
    answers: Vec<DnsAnswer>,
    aborted: bool,
) -> Result<DnsMessage, DnsError> {
    let mut header = create_response_header(request.header());
    if aborted && answers.is_empty() && header.flags.rcode == RCODE_NO_ERROR {
        header.flags.rcode = RCODE_SERVER_FAILURE;
    }

    let mut response = DnsMessage::new(header);

    for question in request.questions() {
        response.add_question(question.clone())?;
    }

    for answer in answers {
        response.add_answer(answer)?;
    }

    Ok(response)
}

/// Build a header-only reply carrying `rcode`, for a request that could
/// not be answered normally.
/// The ID is echoed when at least two bytes arrived; opcode and RD are
/// echoed when the full header is present. Returns `None` when there is
/// not even an ID to answer to.
pub fn build_error_reply(buf: &[u8], rcode: u8) -> Option<Bytes> {
    let id = match buf {
        [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
        _ => return None,
    };

    let request_flags = DnsHeader::from_bytes(buf)
        .map(|header| header.flags)
        .unwrap_or_default();

    let header = DnsHeader {
        id,
        flags: DnsFlags {
            qr: true,
            opcode: request_flags.opcode,
            rd: request_flags.rd,
            rcode,
            ..DnsFlags::default()
        },
        ..DnsHeader::default()
    };

    Some(Bytes::copy_from_slice(&header.to_bytes()))
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::dns_header::RCODE_FORMAT_ERROR;
    use crate::dns_question_and_answer::{RecordClass, RecordType};

    fn query_bytes(id: u16, opcode: u8, names: &[&str]) -> Bytes {
        let mut request = DnsMessage::new(DnsHeader {
            id,
            flags: DnsFlags {
                opcode,
                rd: true,
                ..DnsFlags::default()
            },
            ..DnsHeader::default()
        });
        for name in names {
            request
                .add_question(DnsQuestion::new(*name, RecordType::A, RecordClass::IN))
                .unwrap();
        }
        request.to_bytes().unwrap()
    }

    #[test]
    fn test_counts_follow_sections() {
        let mut message = DnsMessage::new(DnsHeader {
            id: 7,
            question_count: 9,
            answer_count: 9,
            ..DnsHeader::default()
        });

        for i in 0..3 {
            message.add_question(DnsQuestion::new(
                format!("q{i}.example"),
                RecordType::A,
                RecordClass::IN,
            ))
            .unwrap();
        }
        for i in 0..2 {
            message.add_answer(DnsAnswer::new_a_record(
                format!("q{i}.example"),
                60,
                Ipv4Addr::new(10, 0, 0, i),
            ))
            .unwrap();
        }
        // Duplicates are kept
        message.add_answer(message.answers()[0].clone()).unwrap();

        let bytes = message.to_bytes().unwrap();
        let header = DnsHeader::from_bytes(&bytes).unwrap();
        assert_eq!(header.question_count, 3);
        assert_eq!(header.answer_count, 3);

        let parsed = DnsMessage::parse(&bytes).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_parse_request_with_compressed_questions() {
        let mut packet = DnsHeader {
            id: 42,
            question_count: 2,
            ..DnsHeader::default()
        }
        .to_bytes()
        .to_vec();
        // 12: [3]abc[13]longassdomain[3]com[0] A IN
        packet.extend_from_slice(b"\x03abc\x0dlongassdomain\x03com\x00\x00\x01\x00\x01");
        // second question reuses "longassdomain.com" at offset 16
        packet.extend_from_slice(b"\x03def\xc0\x10\x00\x01\x00\x01");

        let message = DnsMessage::parse(&packet).unwrap();
        let names: Vec<_> = message.questions().iter().map(|q| q.name.as_str()).collect();
        assert_eq!(names, ["abc.longassdomain.com", "def.longassdomain.com"]);

        // Re-serialised names are self-contained
        let bytes = message.to_bytes().unwrap();
        assert!(!bytes.contains(&0xC0));
        assert_eq!(DnsMessage::parse(&bytes).unwrap(), message);
    }

    #[test]
    fn test_parse_skips_authority_and_additional() {
        let mut packet = DnsHeader {
            id: 1,
            question_count: 1,
            authority_count: 1,
            additional_count: 2,
            ..DnsHeader::default()
        }
        .to_bytes()
        .to_vec();
        packet.extend_from_slice(b"\x02io\x00\x00\x01\x00\x01");

        let message = DnsMessage::parse(&packet).unwrap();
        assert_eq!(message.questions().len(), 1);
        assert!(message.answers().is_empty());
        assert_eq!(message.header().authority_count, 1);
        assert_eq!(message.header().additional_count, 2);

        // Those records were never kept, so the rewritten packet claims none
        let bytes = message.to_bytes().unwrap();
        let header = DnsHeader::from_bytes(&bytes).unwrap();
        assert_eq!(bytes.len(), packet.len());
        assert_eq!(header.question_count, 1);
        assert_eq!(header.authority_count, 0);
        assert_eq!(header.additional_count, 0);
    }

    #[test]
    fn test_new_message_resets_all_counts() {
        let message = DnsMessage::new(DnsHeader {
            id: 2,
            question_count: 1,
            answer_count: 2,
            authority_count: 5,
            additional_count: 6,
            ..DnsHeader::default()
        });

        let header = DnsHeader::from_bytes(&message.to_bytes().unwrap()).unwrap();
        assert_eq!(header.id, 2);
        assert_eq!(header.question_count, 0);
        assert_eq!(header.answer_count, 0);
        assert_eq!(header.authority_count, 0);
        assert_eq!(header.additional_count, 0);
    }

    #[test]
    fn test_section_full() {
        let mut message = DnsMessage::new(DnsHeader::default());
        let question = DnsQuestion::new("a.io", RecordType::A, RecordClass::IN);

        for _ in 0..u16::MAX {
            message.add_question(question.clone()).unwrap();
        }
        assert!(matches!(
            message.add_question(question),
            Err(DnsError::SectionFull)
        ));
        assert_eq!(message.header().question_count, u16::MAX);
        assert_eq!(message.questions().len(), usize::from(u16::MAX));
    }

    #[test]
    fn test_parse_truncated_question_section() {
        let bytes = query_bytes(5, 0, &["codecrafters.io"]);
        let truncated = &bytes[..bytes.len() - 2];
        assert!(matches!(
            DnsMessage::parse(truncated),
            Err(DnsError::TruncatedPacket { .. })
        ));
    }

    #[test]
    fn test_response_header_opcode_policy() {
        let request = DnsMessage::parse(&query_bytes(1234, 0, &["a.io"])).unwrap();
        let header = create_response_header(request.header());
        assert_eq!(header.id, 1234);
        assert!(header.flags.qr);
        assert!(header.flags.rd);
        assert_eq!(header.flags.opcode, 0);
        assert_eq!(header.flags.rcode, RCODE_NO_ERROR);

        let request = DnsMessage::parse(&query_bytes(99, 5, &["a.io"])).unwrap();
        let header = create_response_header(request.header());
        assert_eq!(header.flags.opcode, 5);
        assert_eq!(header.flags.rcode, RCODE_NOT_IMPLEMENTED);
    }

    #[test]
    fn test_format_error_reply() {
        let mut bytes = query_bytes(0xBEEF, 0, &["a.io"]).to_vec();
        bytes.truncate(14);

        let reply = build_error_reply(&bytes, RCODE_FORMAT_ERROR).unwrap();
        let header = DnsHeader::from_bytes(&reply).unwrap();
        assert_eq!(reply.len(), HEADER_LEN);
        assert_eq!(header.id, 0xBEEF);
        assert!(header.flags.qr);
        assert!(header.flags.rd);
        assert_eq!(header.flags.rcode, RCODE_FORMAT_ERROR);
        assert_eq!(header.question_count, 0);

        let reply = build_error_reply(&[0x12, 0x34, 0x01], RCODE_FORMAT_ERROR).unwrap();
        let header = DnsHeader::from_bytes(&reply).unwrap();
        assert_eq!(header.id, 0x1234);
        assert!(!header.flags.rd);

        assert!(build_error_reply(&[0x12], RCODE_FORMAT_ERROR).is_none());
    }

    #[test]
    fn test_build_response_echoes_questions() {
        let request = DnsMessage::parse(&query_bytes(1234, 0, &["abc.io", "def.io"])).unwrap();
        let answers = vec![DnsAnswer::new_a_record(
            "abc.io".to_string(),
            60,
            Ipv4Addr::new(8, 8, 8, 8),
        )];

        let reply = build_response(&request, answers, true).unwrap();

        assert_eq!(reply.header().id, 1234);
        assert!(reply.header().flags.qr);
        assert_eq!(reply.header().flags.rcode, RCODE_NO_ERROR);
        assert_eq!(reply.header().question_count, 2);
        assert_eq!(reply.header().answer_count, 1);
        assert_eq!(reply.questions(), request.questions());
    }

    #[test]
    fn test_build_response_server_failure() {
        let request = DnsMessage::parse(&query_bytes(3, 0, &["abc.io"])).unwrap();

        let reply = build_response(&request, Vec::new(), true).unwrap();
        assert_eq!(reply.header().flags.rcode, RCODE_SERVER_FAILURE);
        assert_eq!(reply.header().question_count, 1);
        assert_eq!(reply.header().answer_count, 0);

        let reply = build_response(&request, Vec::new(), false).unwrap();
        assert_eq!(reply.header().flags.rcode, RCODE_NO_ERROR);

        // Unsupported opcodes keep their own status
        let request = DnsMessage::parse(&query_bytes(3, 5, &["abc.io"])).unwrap();
        let reply = build_response(&request, Vec::new(), true).unwrap();
        assert_eq!(reply.header().flags.rcode, RCODE_NOT_IMPLEMENTED);
    }
}
