use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use crate::dns_header::DnsHeader;
use crate::dns_message::DnsMessage;
use crate::dns_question_and_answer::{DnsAnswer, DnsQuestion, RecordClass, RecordType};
use crate::error::DnsError;

/// Largest reply datagram read from upstream
pub const MAX_UDP_PAYLOAD: usize = 512;

/// One connection to an upstream resolver, held for a whole forwarding batch
pub trait Upstream {
    fn send(&mut self, query: &[u8]) -> io::Result<()>;

    /// Block for one reply datagram, for at most `timeout`
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

/// Connected UDP socket to the resolver
pub struct UdpUpstream {
    socket: UdpSocket,
}

impl UdpUpstream {
    pub fn connect(resolver_addr: &str) -> io::Result<Self> {
        let remote = resolver_addr.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no address for resolver {resolver_addr}"),
            )
        })?;

        let local = match remote {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };

        let socket = UdpSocket::bind(local)?;
        socket.connect(remote)?;

        Ok(Self { socket })
    }
}

impl Upstream for UdpUpstream {
    fn send(&mut self, query: &[u8]) -> io::Result<()> {
        self.socket.send(query).map(|_| ())
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.socket.set_read_timeout(Some(timeout))?;
        self.socket.recv(buf)
    }
}

/// Answers gathered for a batch, plus the error that cut it short, if any
#[derive(Debug, Default)]
pub struct ForwardOutcome {
    pub answers: Vec<DnsAnswer>,
    pub aborted: Option<DnsError>,
}

/// Relays questions to a fixed upstream resolver
#[derive(Debug, Clone)]
pub struct Forwarder {
    resolver_addr: String,
    upstream_timeout: Duration,
}

impl Forwarder {
    pub fn new(resolver_addr: String, upstream_timeout: Duration) -> Self {
        Self {
            resolver_addr,
            upstream_timeout,
        }
    }

    pub fn resolver_addr(&self) -> &str {
        &self.resolver_addr
    }

    /// Forward every question over one fresh connection.
    /// Never fails: a connection error yields an empty, aborted outcome.
    pub fn forward(
        &self,
        request_id: u16,
        questions: &[DnsQuestion],
        deadline: Instant,
    ) -> ForwardOutcome {
        let mut upstream = match UdpUpstream::connect(&self.resolver_addr) {
            Ok(upstream) => upstream,
            Err(e) => {
                warn!(resolver = %self.resolver_addr, error = %e, "failed to connect to resolver");
                return ForwardOutcome {
                    answers: Vec::new(),
                    aborted: Some(e.into()),
                };
            }
        };

        forward_questions(
            &mut upstream,
            request_id,
            questions,
            self.upstream_timeout,
            deadline,
        )
    }
}

/// Build a DNS query with a single question to send to upstream resolver.
/// Only RD is set and the original request ID is reused.
fn build_single_question_query(original_id: u16, question: &DnsQuestion) -> Result<Bytes, DnsError> {
    let mut query = BytesMut::with_capacity(MAX_UDP_PAYLOAD);

    DnsHeader::single_query(original_id).write(&mut query);
    question.write(&mut query)?;

    Ok(query.freeze())
}

/// One round trip for one question: send, await the reply, parse its answers
fn exchange<U: Upstream>(
    upstream: &mut U,
    request_id: u16,
    question: &DnsQuestion,
    timeout: Duration,
    deadline: Instant,
) -> Result<Vec<DnsAnswer>, DnsError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(io::Error::new(io::ErrorKind::TimedOut, "request deadline exceeded").into());
    }

    let query = build_single_question_query(request_id, question)?;
    upstream.send(&query)?;

    let mut response_buf = [0u8; MAX_UDP_PAYLOAD];
    let response_size = upstream.recv(&mut response_buf, timeout.min(remaining))?;

    let reply = DnsMessage::parse(&response_buf[..response_size])?;
    Ok(reply.into_answers())
}

/// Forward questions one at a time and collect all answers.
/// The first failed round trip ends the batch; answers from earlier
/// questions are kept and later questions are never sent.
pub fn forward_questions<U: Upstream>(
    upstream: &mut U,
    request_id: u16,
    questions: &[DnsQuestion],
    timeout: Duration,
    deadline: Instant,
) -> ForwardOutcome {
    let mut outcome = ForwardOutcome::default();

    for question in questions {
        match exchange(upstream, request_id, question, timeout, deadline) {
            Ok(mut answers) => {
                debug!(
                    name = %question.name,
                    qtype = ?RecordType::from_u16(question.qtype),
                    qclass = ?RecordClass::from_u16(question.qclass),
                    answers = answers.len(),
                    "upstream answered"
                );
                outcome.answers.append(&mut answers);
            }
            Err(e) => {
                warn!(name = %question.name, error = %e, "aborting forward batch");
                outcome.aborted = Some(e);
                break;
            }
        }
    }

    outcome
}
