mod dns_header;
mod dns_message;
mod dns_name;
mod dns_question_and_answer;
mod error;
mod forwarder;
mod local;
mod server;

use std::time::Duration;

use clap::Parser;
use server::{DnsServer, ServerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dns-forwarder")]
#[command(about = "Minimal DNS forwarder over UDP")]
struct Args {
    /// Upstream DNS resolver address (e.g., 8.8.8.8:53)
    #[arg(long)]
    resolver: Option<String>,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:2053")]
    bind: String,

    /// Per-reply wait on the upstream resolver, in milliseconds
    #[arg(long, default_value_t = 2000, value_parser = clap::value_parser!(u64).range(1..))]
    upstream_timeout_ms: u64,

    /// Budget for forwarding all questions of one request, in milliseconds
    #[arg(long, default_value_t = 5000, value_parser = clap::value_parser!(u64).range(1..))]
    request_timeout_ms: u64,

    /// Log filter (trace, debug, info, warn, error); defaults to RUST_LOG, then info
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logging(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.log_level.as_deref());

    let config = ServerConfig {
        bind_addr: args.bind,
        resolver: args.resolver,
        upstream_timeout: Duration::from_millis(args.upstream_timeout_ms),
        request_timeout: Duration::from_millis(args.request_timeout_ms),
    };

    let server = DnsServer::new(config)?;
    info!(addr = %server.local_addr()?, "listening");

    server.run();

    Ok(())
}
