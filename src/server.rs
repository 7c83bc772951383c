use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use anyhow::Context;
use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::dns_header::{RCODE_FORMAT_ERROR, RCODE_SERVER_FAILURE};
use crate::dns_message::{build_error_reply, build_response, DnsMessage};
use crate::forwarder::{ForwardOutcome, Forwarder, MAX_UDP_PAYLOAD};
use crate::local::create_response_answers;

/// Runtime settings for the server, as assembled from the command line
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub resolver: Option<String>,
    pub upstream_timeout: Duration,
    pub request_timeout: Duration,
}

/// DNS Server that handles incoming DNS requests
pub struct DnsServer {
    socket: UdpSocket,
    forwarder: Option<Forwarder>,
    request_timeout: Duration,
}

impl DnsServer {
    /// Create a new DNS server bound to the configured address
    /// With a resolver configured, questions are forwarded upstream
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(&config.bind_addr)
            .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

        let forwarder = config
            .resolver
            .map(|resolver| Forwarder::new(resolver, config.upstream_timeout));

        Ok(Self {
            socket,
            forwarder,
            request_timeout: config.request_timeout,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Run the DNS server main loop
    /// Requests are handled one at a time; a failed request never stops the loop
    pub fn run(&self) {
        match &self.forwarder {
            Some(forwarder) => info!(resolver = forwarder.resolver_addr(), "forwarding to resolver"),
            None => info!("no resolver configured, answering locally"),
        }

        loop {
            let mut buf = [0u8; MAX_UDP_PAYLOAD];

            let (size, source) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) => {
                    error!(error = %e, "error receiving data");
                    continue;
                }
            };
            debug!(size, %source, "received request");

            let Some(response) = self.handle_request(&buf[..size]) else {
                warn!(size, %source, "dropping request too short to answer");
                continue;
            };

            if let Err(e) = self.socket.send_to(&response, source) {
                error!(error = %e, %source, "failed to send response");
            }
        }
    }

    /// Handle a DNS request: parse, resolve, and build response
    fn handle_request(&self, buf: &[u8]) -> Option<Bytes> {
        handle_request(buf, |request| match &self.forwarder {
            Some(forwarder) => {
                let deadline = Instant::now() + self.request_timeout;
                forwarder.forward(request.header().id, request.questions(), deadline)
            }
            None => ForwardOutcome {
                answers: create_response_answers(request.questions()),
                aborted: None,
            },
        })
    }
}

/// Turn one inbound datagram into the reply datagram.
/// `resolve` supplies the answers for a parsed request. Unparseable requests
/// get a FORMERR reply; `None` means there is nothing to reply to.
pub fn handle_request<F>(buf: &[u8], resolve: F) -> Option<Bytes>
where
    F: FnOnce(&DnsMessage) -> ForwardOutcome,
{
    let request = match DnsMessage::parse(buf) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "malformed request");
            return build_error_reply(buf, RCODE_FORMAT_ERROR);
        }
    };

    let outcome = resolve(&request);
    let response = build_response(&request, outcome.answers, outcome.aborted.is_some())
        .and_then(|response| {
            debug!(
                id = request.header().id,
                questions = response.questions().len(),
                answers = response.answers().len(),
                "built response"
            );
            response.to_bytes()
        });

    match response {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            error!(error = %e, "failed to serialize response");
            build_error_reply(buf, RCODE_SERVER_FAILURE)
        }
    }
}
