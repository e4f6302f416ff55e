//! DNS message engine: builds raw queries, parses replies into
//! [`ParsedResponse`] and moves bytes through a [`DnsTransport`].
//!
//! Parsing is strict. A record type we do not understand aborts the parse
//! instead of being dropped, so protocol drift surfaces as a finding.

use crate::findings::CheckUnit;
use crate::network::{udp_exchange, IpVersion};
use crate::utils::{format_duration, NetworkError, Result};
use futures::future::BoxFuture;
use hickory_client::op::{Edns, Message, MessageType, OpCode, Query, ResponseCode};
use hickory_client::rr::rdata::opt::{EdnsCode, EdnsOption};
use hickory_client::rr::{DNSClass, Name, RData, Record, RecordType};
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

pub mod doh;

pub const DNS_PORT: u16 = 53;

/// UDP payload size advertised in the OPT record.
pub const EDNS_PAYLOAD: u16 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    A,
    Aaaa,
    Soa,
    Ns,
    /// CHAOS-class TXT, used for `version.bind` style diagnostics.
    Txt,
}

impl QueryType {
    pub fn for_family(version: IpVersion) -> Self {
        match version {
            IpVersion::V4 => QueryType::A,
            IpVersion::V6 => QueryType::Aaaa,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            QueryType::A => "A",
            QueryType::Aaaa => "AAAA",
            QueryType::Soa => "SOA",
            QueryType::Ns => "NS",
            QueryType::Txt => "TXT",
        }
    }

    /// Numeric RR type, as used by the JSON DoH API.
    pub const fn code(self) -> u16 {
        match self {
            QueryType::A => 1,
            QueryType::Ns => 2,
            QueryType::Soa => 6,
            QueryType::Txt => 16,
            QueryType::Aaaa => 28,
        }
    }

    fn record_type(self) -> RecordType {
        match self {
            QueryType::A => RecordType::A,
            QueryType::Aaaa => RecordType::AAAA,
            QueryType::Soa => RecordType::SOA,
            QueryType::Ns => RecordType::NS,
            QueryType::Txt => RecordType::TXT,
        }
    }

    fn class(self) -> DNSClass {
        match self {
            QueryType::Txt => DNSClass::CH,
            _ => DNSClass::IN,
        }
    }
}

impl FromStr for QueryType {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(QueryType::A),
            "AAAA" => Ok(QueryType::Aaaa),
            "SOA" => Ok(QueryType::Soa),
            "NS" => Ok(QueryType::Ns),
            "TXT" => Ok(QueryType::Txt),
            _ => Err(NetworkError::UnsupportedQueryType(s.to_string())),
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A DNS question plus the header and EDNS knobs we care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery {
    name: String,
    qtype: QueryType,
    recursion_desired: bool,
    dnssec_ok: bool,
    nsid: bool,
    zero_id: bool,
}

impl DnsQuery {
    /// A recursive query with a random ID and no EDNS.
    pub fn new(name: impl Into<String>, qtype: QueryType) -> Self {
        Self {
            name: name.into(),
            qtype,
            recursion_desired: true,
            dnssec_ok: false,
            nsid: false,
            zero_id: false,
        }
    }

    pub fn with_recursion(mut self, recursion_desired: bool) -> Self {
        self.recursion_desired = recursion_desired;
        self
    }

    pub fn with_dnssec_ok(mut self, dnssec_ok: bool) -> Self {
        self.dnssec_ok = dnssec_ok;
        self
    }

    pub fn with_nsid(mut self, nsid: bool) -> Self {
        self.nsid = nsid;
        self
    }

    pub fn with_zero_id(mut self, zero_id: bool) -> Self {
        self.zero_id = zero_id;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qtype(&self) -> QueryType {
        self.qtype
    }

    /// The query name with exactly one trailing dot.
    pub fn fqdn(&self) -> String {
        let trimmed = self.name.trim_end_matches('.');
        format!("{trimmed}.")
    }

    pub fn build(&self) -> Result<BuiltQuery> {
        let name = Name::from_ascii(self.fqdn())
            .map_err(|e| NetworkError::Protocol(format!("invalid name {:?}: {}", self.name, e)))?;

        let mut query = Query::query(name, self.qtype.record_type());
        query.set_query_class(self.qtype.class());

        let id = if self.zero_id { 0 } else { rand::random() };

        let mut message = Message::new();
        message
            .set_id(id)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Query)
            .set_recursion_desired(self.recursion_desired)
            .add_query(query);

        if self.nsid || self.dnssec_ok {
            let mut edns = Edns::new();
            edns.set_max_payload(EDNS_PAYLOAD);
            edns.set_dnssec_ok(self.dnssec_ok);
            if self.nsid {
                edns.options_mut()
                    .insert(EdnsOption::Unknown(u16::from(EdnsCode::NSID), Vec::new()));
            }
            message.set_edns(edns);
        }

        let wire = message
            .to_vec()
            .map_err(|e| NetworkError::Protocol(format!("failed to serialize query: {}", e)))?;

        Ok(BuiltQuery { id, wire })
    }
}

/// Wire bytes of a query, ready for one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    id: u16,
    wire: Vec<u8>,
}

impl BuiltQuery {
    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn wire(&self) -> &[u8] {
        &self.wire
    }
}

/// Record kinds a reply can populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    A,
    Aaaa,
    Soa,
    Ns,
    Cname,
    Txt,
    Nsid,
}

impl RecordKind {
    pub const fn label(self) -> &'static str {
        match self {
            RecordKind::A => "A",
            RecordKind::Aaaa => "AAAA",
            RecordKind::Soa => "SOA",
            RecordKind::Ns => "NS",
            RecordKind::Cname => "CNAME",
            RecordKind::Txt => "TXT",
            RecordKind::Nsid => "NSID",
        }
    }

    pub fn for_family(version: IpVersion) -> Self {
        match version {
            IpVersion::V4 => RecordKind::A,
            IpVersion::V6 => RecordKind::Aaaa,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Record values of a reply grouped by kind, in wire order within each kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    records: BTreeMap<RecordKind, Vec<String>>,
}

impl ParsedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: RecordKind, value: impl Into<String>) {
        self.records.entry(kind).or_default().push(value.into());
    }

    pub fn get(&self, kind: RecordKind) -> &[String] {
        self.records.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.values().all(Vec::is_empty)
    }

    /// A and AAAA values together.
    pub fn addresses(&self) -> impl Iterator<Item = &String> {
        self.get(RecordKind::A)
            .iter()
            .chain(self.get(RecordKind::Aaaa).iter())
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordKind, &[String])> {
        self.records.iter().map(|(kind, values)| (*kind, values.as_slice()))
    }
}

/// Parses a reply without checking it against a query.
pub fn parse_response(wire: &[u8]) -> Result<ParsedResponse> {
    let message = Message::from_vec(wire)
        .map_err(|e| NetworkError::Protocol(format!("malformed DNS message: {}", e)))?;
    parse_message(&message)
}

/// Parses a reply and verifies it answers `query`.
pub fn parse_reply(query: &BuiltQuery, wire: &[u8]) -> Result<ParsedResponse> {
    let message = Message::from_vec(wire)
        .map_err(|e| NetworkError::Protocol(format!("malformed DNS message: {}", e)))?;
    if message.id() != query.id {
        return Err(NetworkError::IdMismatch {
            expected: query.id,
            got: message.id(),
        });
    }
    parse_message(&message)
}

fn parse_message(message: &Message) -> Result<ParsedResponse> {
    let rcode = message.response_code();
    if rcode != ResponseCode::NoError {
        return Err(NetworkError::response_code(rcode));
    }

    let mut parsed = ParsedResponse::new();

    for record in message.answers() {
        parse_answer(record, &mut parsed)?;
    }

    // referrals carry the delegation here; SOA in this section is negative caching
    for record in message.name_servers() {
        if let Some(RData::NS(ns)) = record.data() {
            parsed.push(RecordKind::Ns, ns.0.to_string());
        }
    }

    if let Some(edns) = message.extensions() {
        if let Some(EdnsOption::Unknown(_, data)) = edns.option(EdnsCode::NSID) {
            if !data.is_empty() {
                parsed.push(RecordKind::Nsid, String::from_utf8_lossy(data));
            }
        }
    }

    Ok(parsed)
}

fn parse_answer(record: &Record, parsed: &mut ParsedResponse) -> Result<()> {
    // signatures accompany DO-bit answers and carry no values we report
    if record.record_type() == RecordType::RRSIG {
        return Ok(());
    }

    match record.data() {
        Some(RData::A(a)) => parsed.push(RecordKind::A, a.0.to_string()),
        Some(RData::AAAA(aaaa)) => parsed.push(RecordKind::Aaaa, aaaa.0.to_string()),
        Some(RData::SOA(soa)) => parsed.push(
            RecordKind::Soa,
            format!("{} {}", soa.mname(), soa.serial()),
        ),
        Some(RData::NS(ns)) => parsed.push(RecordKind::Ns, ns.0.to_string()),
        Some(RData::CNAME(cname)) => parsed.push(RecordKind::Cname, cname.0.to_string()),
        Some(RData::TXT(txt)) => parsed.push(RecordKind::Txt, txt.to_string()),
        _ => {
            return Err(NetworkError::UnsupportedRecord(
                record.record_type().to_string(),
            ))
        }
    }
    Ok(())
}

const LABEL_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Random lowercase alphanumeric label, used for names that must not exist.
/// Each character is drawn uniformly from `[a-z0-9]`.
pub fn random_label(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(LABEL_CHARS[rng.random_range(0..LABEL_CHARS.len())]))
        .collect()
}

/// Raw reply of one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub response: Vec<u8>,
    pub rtt: Duration,
}

/// Moves one query to a server and one reply back.
pub trait DnsTransport: Send + Sync {
    fn exchange<'a>(
        &'a self,
        server: SocketAddr,
        query: &'a [u8],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Exchange>>;

    fn protocol(&self) -> &'static str {
        "udp"
    }
}

/// Plain DNS over UDP port 53.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpTransport;

impl DnsTransport for UdpTransport {
    fn exchange<'a>(
        &'a self,
        server: SocketAddr,
        query: &'a [u8],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Exchange>> {
        Box::pin(async move {
            let (response, rtt) = udp_exchange(server, query, timeout).await?;
            Ok(Exchange { response, rtt })
        })
    }
}

/// Builds, exchanges and parses one query against `server:53`, reporting the
/// exchange statistics as a detail finding on success.
pub async fn query(
    check: &CheckUnit,
    transport: &dyn DnsTransport,
    server: IpAddr,
    query: &DnsQuery,
    timeout: Duration,
) -> Result<ParsedResponse> {
    let built = query.build()?;
    let addr = SocketAddr::new(server, DNS_PORT);

    log::debug!("{}: {} {} @{}", check.name(), query.qtype(), query.fqdn(), addr);

    let exchange = transport.exchange(addr, built.wire(), timeout).await?;
    let parsed = parse_reply(&built, &exchange.response)?;

    check.detail(
        "DNS_QUERY_STATS",
        format!(
            "Query time: {}, server: {} ({}), size: {} bytes",
            format_duration(exchange.rtt),
            addr,
            transport.protocol(),
            exchange.response.len()
        ),
    );

    Ok(parsed)
}

#[cfg(test)]
mod tests;
