//! DNS probe strategy
//!
//! Asks the configured resolver for an A record and, failing that, for an
//! AAAA record. Only the first answer record of each response is looked at.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::{Message as DnsMessage, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RecordType};
use tokio::net::UdpSocket;

use cmdns_core::traits::Resolver;
use cmdns_core::{ConfigError, ProbeError};

/// Port assumed when the resolver address has none
pub const DEFAULT_DNS_PORT: u16 = 53;

/// Largest UDP response accepted
const MAX_RESPONSE_SIZE: usize = 4096;

/// One query/response round trip with a resolver
#[async_trait]
pub trait DnsExchange: Send + Sync {
    /// Send `query` and wait for the matching response
    async fn exchange(&self, query: DnsMessage) -> Result<DnsMessage, ProbeError>;
}

/// Plain UDP exchange with a single resolver
#[derive(Debug, Clone)]
pub struct UdpExchange {
    server: SocketAddr,
    timeout: Duration,
}

impl UdpExchange {
    /// Exchange with `server`, giving up after `timeout`
    pub fn new(server: SocketAddr, timeout: Duration) -> Self {
        Self { server, timeout }
    }
}

#[async_trait]
impl DnsExchange for UdpExchange {
    async fn exchange(&self, query: DnsMessage) -> Result<DnsMessage, ProbeError> {
        let local: SocketAddr = if self.server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await.map_err(exchange_error)?;
        socket.connect(self.server).await.map_err(exchange_error)?;

        let request = query.to_vec().map_err(exchange_error)?;
        socket.send(&request).await.map_err(exchange_error)?;

        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut buf = vec![0u8; MAX_RESPONSE_SIZE];
        loop {
            let len = tokio::time::timeout_at(deadline, socket.recv(&mut buf))
                .await
                .map_err(|_| {
                    ProbeError::Exchange(format!("read udp {}: i/o timeout", self.server))
                })?
                .map_err(exchange_error)?;

            let response = match DnsMessage::from_vec(&buf[..len]) {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!("Ignoring unparseable response from {}: {}", self.server, e);
                    continue;
                }
            };
            if response.id() != query.id() {
                tracing::debug!(
                    "Ignoring response with id {} (expected {})",
                    response.id(),
                    query.id()
                );
                continue;
            }
            return Ok(response);
        }
    }
}

fn exchange_error(e: impl std::fmt::Display) -> ProbeError {
    ProbeError::Exchange(e.to_string())
}

/// Probes a domain with A then AAAA queries
pub struct DnsResolver<E = UdpExchange> {
    exchange: E,
}

impl<E: DnsExchange> DnsResolver<E> {
    /// Create a resolver using `exchange` for every query
    pub fn new(exchange: E) -> Self {
        Self { exchange }
    }

    async fn first_answer_type(
        &self,
        name: &Name,
        record_type: RecordType,
    ) -> Result<Option<RecordType>, ProbeError> {
        let response = self.exchange.exchange(build_query(name, record_type)).await?;
        Ok(response.answers().first().map(|record| record.record_type()))
    }
}

#[async_trait]
impl<E: DnsExchange> Resolver for DnsResolver<E> {
    fn strategy(&self) -> &'static str {
        "dns"
    }

    async fn resolve(&self, domain: &str) -> Result<(), ProbeError> {
        let name = fqdn(domain)?;

        if self.first_answer_type(&name, RecordType::A).await? == Some(RecordType::A) {
            return Ok(());
        }

        match self.first_answer_type(&name, RecordType::AAAA).await? {
            Some(RecordType::AAAA) => Ok(()),
            Some(other) => {
                tracing::debug!("First answer for {} is {}", name, other);
                Err(ProbeError::NoAddressRecord)
            }
            None => Err(ProbeError::NoAnswer),
        }
    }
}

fn fqdn(domain: &str) -> Result<Name, ProbeError> {
    let absolute = format!("{}.", domain.trim_end_matches('.'));
    Name::from_ascii(&absolute)
        .map_err(|e| ProbeError::Exchange(format!("invalid domain name {:?}: {}", domain, e)))
}

fn build_query(name: &Name, record_type: RecordType) -> DnsMessage {
    let mut message = DnsMessage::new();
    message
        .set_id(rand::random::<u16>())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(name.clone(), record_type));
    message
}

/// Turn a configured resolver address into a socket address
///
/// Accepts `ip`, `ip:port`, `[ipv6]:port`, `host` and `host:port`; the port
/// defaults to 53.
pub async fn resolver_socket_addr(address: &str) -> Result<SocketAddr, ConfigError> {
    let address = address.trim();
    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }
    let bare = address.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_DNS_PORT));
    }

    let target = if address.contains(':') {
        address.to_string()
    } else {
        format!("{}:{}", address, DEFAULT_DNS_PORT)
    };
    let mut addrs = tokio::net::lookup_host(target.as_str())
        .await
        .map_err(|e| ConfigError::InvalidResolver(format!("{}: {}", address, e)))?;
    addrs
        .next()
        .ok_or_else(|| ConfigError::InvalidResolver(format!("{}: no addresses", address)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::rr::rdata::{A, AAAA, CNAME};
    use hickory_proto::rr::{RData, Record};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Answers queries from a script and remembers what was asked
    #[derive(Clone)]
    struct ScriptedExchange {
        replies: Arc<Mutex<VecDeque<Vec<RData>>>>,
        asked: Arc<Mutex<Vec<RecordType>>>,
    }

    impl ScriptedExchange {
        fn new(replies: Vec<Vec<RData>>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies.into())),
                asked: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn asked(&self) -> Vec<RecordType> {
            self.asked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DnsExchange for ScriptedExchange {
        async fn exchange(&self, query: DnsMessage) -> Result<DnsMessage, ProbeError> {
            let question = query.queries()[0].clone();
            self.asked.lock().unwrap().push(question.query_type());

            let answers = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected query");
            let mut response = DnsMessage::new();
            response
                .set_id(query.id())
                .set_message_type(MessageType::Response)
                .add_query(question.clone());
            for rdata in answers {
                response.add_answer(Record::from_rdata(question.name().clone(), 60, rdata));
            }
            Ok(response)
        }
    }

    struct FailingExchange;

    #[async_trait]
    impl DnsExchange for FailingExchange {
        async fn exchange(&self, _query: DnsMessage) -> Result<DnsMessage, ProbeError> {
            Err(ProbeError::Exchange("read udp 192.0.2.53:53: i/o timeout".into()))
        }
    }

    fn a() -> RData {
        RData::A(A(Ipv4Addr::new(192, 0, 2, 1)))
    }

    fn aaaa() -> RData {
        RData::AAAA(AAAA(Ipv6Addr::LOCALHOST))
    }

    fn cname() -> RData {
        RData::CNAME(CNAME(Name::from_ascii("target.example.net.").unwrap()))
    }

    #[tokio::test]
    async fn test_a_answer_skips_aaaa_query() {
        let exchange = ScriptedExchange::new(vec![vec![a()]]);
        let resolver = DnsResolver::new(exchange.clone());

        resolver.resolve("probe.example.net").await.unwrap();
        assert_eq!(exchange.asked(), vec![RecordType::A]);
    }

    #[tokio::test]
    async fn test_aaaa_only_answer_succeeds() {
        let exchange = ScriptedExchange::new(vec![vec![], vec![aaaa()]]);
        let resolver = DnsResolver::new(exchange.clone());

        resolver.resolve("probe.example.net").await.unwrap();
        assert_eq!(exchange.asked(), vec![RecordType::A, RecordType::AAAA]);
    }

    #[tokio::test]
    async fn test_empty_answers() {
        let exchange = ScriptedExchange::new(vec![vec![], vec![]]);
        let resolver = DnsResolver::new(exchange.clone());

        let err = resolver.resolve("probe.example.net").await.unwrap_err();
        assert_eq!(err, ProbeError::NoAnswer);
        assert_eq!(err.to_string(), "no answer records");
    }

    #[tokio::test]
    async fn test_cname_only_answers() {
        let exchange = ScriptedExchange::new(vec![vec![cname()], vec![cname()]]);
        let resolver = DnsResolver::new(exchange.clone());

        let err = resolver.resolve("probe.example.net").await.unwrap_err();
        assert_eq!(err.to_string(), "no A/AAAA record found in answer");
    }

    #[tokio::test]
    async fn test_only_first_record_counts() {
        // An A record behind a CNAME is not looked at
        let exchange = ScriptedExchange::new(vec![vec![cname(), a()], vec![cname(), aaaa()]]);
        let resolver = DnsResolver::new(exchange.clone());

        let err = resolver.resolve("probe.example.net").await.unwrap_err();
        assert_eq!(err, ProbeError::NoAddressRecord);
    }

    #[tokio::test]
    async fn test_exchange_error_text_is_kept() {
        let resolver = DnsResolver::new(FailingExchange);
        let err = resolver.resolve("probe.example.net").await.unwrap_err();
        assert_eq!(err.to_string(), "read udp 192.0.2.53:53: i/o timeout");
    }

    #[tokio::test]
    async fn test_udp_exchange_round_trip() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = vec![0u8; MAX_RESPONSE_SIZE];
            for _ in 0..2 {
                let (len, peer) = server.recv_from(&mut buf).await.unwrap();
                let query = DnsMessage::from_vec(&buf[..len]).unwrap();
                let question = query.queries()[0].clone();

                let mut response = DnsMessage::new();
                response
                    .set_id(query.id())
                    .set_message_type(MessageType::Response)
                    .add_query(question.clone());
                if question.query_type() == RecordType::AAAA {
                    response.add_answer(Record::from_rdata(question.name().clone(), 60, aaaa()));
                }
                server
                    .send_to(&response.to_vec().unwrap(), peer)
                    .await
                    .unwrap();
            }
        });

        let resolver = DnsResolver::new(UdpExchange::new(server_addr, Duration::from_secs(5)));
        resolver.resolve("v6only.example.net").await.unwrap();
    }

    #[tokio::test]
    async fn test_udp_exchange_times_out() {
        // Bound but silent resolver
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let exchange = UdpExchange::new(silent.local_addr().unwrap(), Duration::from_millis(50));
        let resolver = DnsResolver::new(exchange);

        let err = resolver.resolve("probe.example.net").await.unwrap_err();
        assert!(err.to_string().contains("i/o timeout"), "{err}");
    }

    #[tokio::test]
    async fn test_resolver_address_forms() {
        assert_eq!(
            resolver_socket_addr("192.0.2.53").await.unwrap(),
            "192.0.2.53:53".parse().unwrap()
        );
        assert_eq!(
            resolver_socket_addr("192.0.2.53:5353").await.unwrap(),
            "192.0.2.53:5353".parse().unwrap()
        );
        assert_eq!(
            resolver_socket_addr("2001:db8::53").await.unwrap(),
            "[2001:db8::53]:53".parse().unwrap()
        );
        assert_eq!(
            resolver_socket_addr("[2001:db8::53]:5353").await.unwrap(),
            "[2001:db8::53]:5353".parse().unwrap()
        );
        assert_eq!(
            resolver_socket_addr("localhost").await.unwrap().port(),
            DEFAULT_DNS_PORT
        );
    }
}
