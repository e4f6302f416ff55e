//! Mock transports and helpers shared by the integration tests.
#![allow(dead_code)]

use futures::future::BoxFuture;
use hickory_client::op::{Edns, Message, MessageType, OpCode, Query, ResponseCode};
use hickory_client::rr::rdata::opt::EdnsOption;
use hickory_client::rr::rdata::{A, AAAA, NS, SOA};
use hickory_client::rr::{Name, RData, Record};
use netiscope::config::Settings;
use netiscope::context::RunContext;
use netiscope::dns::{DnsTransport, Exchange};
use netiscope::findings::{CheckUnit, Finding, Severity};
use netiscope::network::{PingStats, Pinger};
use netiscope::utils::{NetworkError, Result};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

pub fn name(s: &str) -> Name {
    Name::from_ascii(s).unwrap()
}

pub fn a(owner: &str, ip: Ipv4Addr) -> Record {
    Record::from_rdata(name(owner), 60, RData::A(A(ip)))
}

pub fn aaaa(owner: &str, ip: Ipv6Addr) -> Record {
    Record::from_rdata(name(owner), 60, RData::AAAA(AAAA(ip)))
}

pub fn ns(owner: &str, target: &str) -> Record {
    Record::from_rdata(name(owner), 172800, RData::NS(NS(name(target))))
}

pub fn root_soa(serial: u32) -> Record {
    let soa = SOA::new(
        name("a.root-servers.net."),
        name("nstld.verisign-grs.com."),
        serial,
        1800,
        900,
        604800,
        86400,
    );
    Record::from_rdata(Name::root(), 86400, RData::SOA(soa))
}

/// What a scripted server sends back for one question.
#[derive(Debug, Clone)]
pub struct Reply {
    pub rcode: ResponseCode,
    pub answers: Vec<Record>,
    pub authority: Vec<Record>,
    pub nsid: Option<String>,
}

impl Reply {
    pub fn answers(answers: Vec<Record>) -> Self {
        Self {
            rcode: ResponseCode::NoError,
            answers,
            authority: Vec::new(),
            nsid: None,
        }
    }

    pub fn referral(authority: Vec<Record>) -> Self {
        Self {
            authority,
            ..Self::answers(Vec::new())
        }
    }

    pub fn rcode(rcode: ResponseCode) -> Self {
        Self {
            rcode,
            ..Self::answers(Vec::new())
        }
    }

    pub fn with_nsid(mut self, nsid: &str) -> Self {
        self.nsid = Some(nsid.to_string());
        self
    }

    fn encode(&self, request: &Message) -> Result<Vec<u8>> {
        let mut message = Message::new();
        message
            .set_id(request.id())
            .set_message_type(MessageType::Response)
            .set_op_code(OpCode::Query)
            .set_response_code(self.rcode);
        message.add_queries(request.queries().to_vec());
        message.add_answers(self.answers.clone());
        message.add_name_servers(self.authority.clone());
        if let Some(nsid) = &self.nsid {
            let mut edns = Edns::new();
            edns.options_mut()
                .insert(EdnsOption::Unknown(3, nsid.as_bytes().to_vec()));
            message.set_edns(edns);
        }
        message
            .to_vec()
            .map_err(|e| NetworkError::Protocol(e.to_string()))
    }
}

type Handler = dyn Fn(IpAddr, &Query) -> Result<Reply> + Send + Sync;

/// A DNS transport answering from a closure instead of the network.
pub struct ScriptedDns {
    handler: Box<Handler>,
    seen: Mutex<Vec<(IpAddr, String)>>,
}

impl ScriptedDns {
    pub fn new(handler: impl Fn(IpAddr, &Query) -> Result<Reply> + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// `(server, "NAME TYPE")` for every question asked so far.
    pub fn seen(&self) -> Vec<(IpAddr, String)> {
        self.seen.lock().unwrap().clone()
    }

    fn answer(&self, server: SocketAddr, query: &[u8]) -> Result<Exchange> {
        assert_eq!(server.port(), 53);
        let request =
            Message::from_vec(query).map_err(|e| NetworkError::Protocol(e.to_string()))?;
        let question = request
            .queries()
            .first()
            .ok_or_else(|| NetworkError::Protocol("no question".into()))?;
        self.seen.lock().unwrap().push((
            server.ip(),
            format!("{} {}", question.name(), question.query_type()),
        ));
        let reply = (self.handler)(server.ip(), question)?;
        Ok(Exchange {
            response: reply.encode(&request)?,
            rtt: Duration::from_millis(3),
        })
    }
}

impl DnsTransport for ScriptedDns {
    fn exchange<'a>(
        &'a self,
        server: SocketAddr,
        query: &'a [u8],
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<Exchange>> {
        let result = self.answer(server, query);
        Box::pin(async move { result })
    }
}

/// Every target answers every packet.
pub struct LosslessPinger;

impl Pinger for LosslessPinger {
    fn ping<'a>(&'a self, _target: IpAddr, count: u32) -> BoxFuture<'a, Result<PingStats>> {
        Box::pin(async move {
            Ok(PingStats {
                transmitted: count,
                received: count,
                loss_percent: 0.0,
            })
        })
    }
}

pub fn settings(toml: &str) -> Settings {
    Settings::parse(toml).unwrap()
}

pub fn context(toml: &str) -> RunContext {
    RunContext::new(settings(toml))
}

/// Runs `body` with a fresh unit and returns everything it reported, in order.
pub async fn collect<F, Fut>(check: &str, body: F) -> Vec<Finding>
where
    F: FnOnce(CheckUnit) -> Fut,
    Fut: Future<Output = ()>,
{
    let (ftx, mut frx) = mpsc::unbounded_channel();
    let (ptx, _prx) = mpsc::unbounded_channel();
    body(CheckUnit::new(check, ftx, ptx)).await;
    let mut findings = Vec::new();
    while let Some(finding) = frx.recv().await {
        findings.push(finding);
    }
    findings
}

pub fn find<'a>(findings: &'a [Finding], mnemonic: &str) -> Vec<&'a Finding> {
    findings
        .iter()
        .filter(|f| f.mnemonic().as_str() == mnemonic)
        .collect()
}

pub fn has(findings: &[Finding], mnemonic: &str) -> bool {
    !find(findings, mnemonic).is_empty()
}

pub fn count_at(findings: &[Finding], severity: Severity) -> usize {
    findings.iter().filter(|f| f.severity() == severity).count()
}
