use std::net::Ipv4Addr;

use crate::dns_question_and_answer::{DnsAnswer, DnsQuestion};

/// Address returned for every question when no resolver is configured
pub const LOCAL_ANSWER_IP: Ipv4Addr = Ipv4Addr::new(8, 8, 8, 8);
pub const LOCAL_ANSWER_TTL: u32 = 60;

/// Create response answers based on the questions
/// Every question gets an A record for its own name pointing to 8.8.8.8
pub fn create_response_answers(questions: &[DnsQuestion]) -> Vec<DnsAnswer> {
    questions
        .iter()
        .map(|question| {
            DnsAnswer::new_a_record(question.name.clone(), LOCAL_ANSWER_TTL, LOCAL_ANSWER_IP)
        })
        .collect()
}
