//! Tri-state evaluation: folding per-target outcomes into one verdict per
//! resolver, and rolling a set of resolvers up into OK / PARTIAL / FAIL.
//!
//! Every check that grades a group of servers goes through [`verdict`] and
//! [`roll_up`], so ties are broken the same way everywhere: a mix of
//! successes and failures is partial, never a plain failure.

use crate::context::RunContext;
use crate::dns::{self, DnsQuery, QueryType, RecordKind};
use crate::findings::{CheckUnit, Severity};
use crate::network::IpVersion;
use crate::utils::NetworkError;
use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Success = 0,
    Partial = 1,
    Failure = 2,
}

/// Counters of success / partial / failure outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeTuple([u32; 3]);

impl OutcomeTuple {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, code: ResultCode) {
        self.0[code as usize] += 1;
    }

    pub fn count(&self, code: ResultCode) -> u32 {
        self.0[code as usize]
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl FromIterator<ResultCode> for OutcomeTuple {
    fn from_iter<I: IntoIterator<Item = ResultCode>>(iter: I) -> Self {
        let mut tuple = Self::new();
        tuple.extend(iter);
        tuple
    }
}

impl Extend<ResultCode> for OutcomeTuple {
    fn extend<I: IntoIterator<Item = ResultCode>>(&mut self, iter: I) {
        for code in iter {
            self.record(code);
        }
    }
}

/// Collapses a tuple into one outcome. `None` when nothing was recorded.
pub fn verdict(tuple: &OutcomeTuple) -> Option<ResultCode> {
    let success = tuple.count(ResultCode::Success);
    let partial = tuple.count(ResultCode::Partial);
    let failure = tuple.count(ResultCode::Failure);

    match (success, partial, failure) {
        (0, 0, 0) => None,
        (_, p, _) if p > 0 => Some(ResultCode::Partial),
        (s, _, f) if s > 0 && f > 0 => Some(ResultCode::Partial),
        (_, _, 0) => Some(ResultCode::Success),
        _ => Some(ResultCode::Failure),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollUp {
    Ok,
    Partial,
    Fail,
}

impl RollUp {
    pub const fn severity(self) -> Severity {
        match self {
            RollUp::Ok => Severity::Info,
            RollUp::Partial => Severity::Warning,
            RollUp::Fail => Severity::Error,
        }
    }

    pub const fn suffix(self) -> &'static str {
        match self {
            RollUp::Ok => "OK",
            RollUp::Partial => "PARTIAL",
            RollUp::Fail => "FAIL",
        }
    }
}

pub fn roll_up(tuple: &OutcomeTuple) -> Option<RollUp> {
    verdict(tuple).map(|code| match code {
        ResultCode::Success => RollUp::Ok,
        ResultCode::Partial => RollUp::Partial,
        ResultCode::Failure => RollUp::Fail,
    })
}

pub fn join_addresses(addresses: &[IpAddr]) -> String {
    addresses
        .iter()
        .map(IpAddr::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// What is being rolled up, for the finding text.
#[derive(Debug, Clone, Copy)]
pub struct RollUpSubject<'a> {
    /// `PING` or `QUERY`.
    pub test: &'a str,
    pub mnemo: &'a str,
    pub family: IpVersion,
    /// e.g. `open DNS resolvers`.
    pub kind: &'a str,
    /// e.g. `reachable`.
    pub verb: &'a str,
}

/// Reports the roll-up of `tuple` as `{TEST}_{MNEMO}_{OK|PARTIAL|FAIL}`.
pub fn report_roll_up(
    check: &CheckUnit,
    subject: RollUpSubject<'_>,
    resolvers: &[IpAddr],
    tuple: &OutcomeTuple,
) -> Option<RollUp> {
    let outcome = roll_up(tuple)?;
    let isare = if resolvers.len() == 1 { "is" } else { "are" };
    let listed = join_addresses(resolvers);
    let RollUpSubject {
        test,
        mnemo,
        family,
        kind,
        verb,
    } = subject;

    let details = match outcome {
        RollUp::Ok => format!("{family} {kind} [{listed}] {isare} {verb} properly"),
        RollUp::Partial => format!("{family} {kind} [{listed}] {isare} only partially {verb}"),
        RollUp::Fail => format!("{family} {kind} [{listed}] {isare} not {verb} properly"),
    };
    check.report(
        outcome.severity(),
        format!("{test}_{mnemo}_{}", outcome.suffix()),
        details,
    );
    check.track();
    Some(outcome)
}

/// Looks `name` up at `resolver` over every enabled family.
///
/// Any error, or no addresses at all, fails the name. A reply carrying an
/// error rcode is reported apart from transport and parse errors. Returned
/// addresses are classified against the provider table but never affect the
/// outcome.
pub async fn query_name_from_resolver(
    ctx: &RunContext,
    check: &CheckUnit,
    name: &str,
    resolver: IpAddr,
) -> ResultCode {
    let timeout = ctx.settings().dns.timeout();
    let mut answers = Vec::new();

    for version in IpVersion::BOTH {
        if !ctx.families().enabled(version) {
            continue;
        }
        let qtype = QueryType::for_family(version);
        let query = DnsQuery::new(name, qtype);
        match dns::query(check, ctx.dns(), resolver, &query, timeout).await {
            Ok(parsed) => answers.extend_from_slice(parsed.get(RecordKind::for_family(version))),
            Err(e @ NetworkError::ResponseCode { .. }) => {
                check.error(format!("RESOLVER_RCODE_{qtype}"), e.to_string());
                return ResultCode::Failure;
            }
            Err(e) => {
                check.error(format!("RESOLVER_ERROR_{qtype}"), e.to_string());
                return ResultCode::Failure;
            }
        }
    }

    if answers.is_empty() {
        check.error(
            "RESOLVER_ZERO_ANSWER",
            format!("Resolver {resolver} gave no answers to query {name}"),
        );
        return ResultCode::Failure;
    }

    check.info(
        "RESOLVER_ANSWERS",
        format!(
            "Resolver {resolver}'s answer(s) to query {name} is: {}",
            answers.join(", ")
        ),
    );

    for address in &answers {
        ctx.providers().report(check, address, name);
        check.track();
    }

    ResultCode::Success
}

/// One outcome per resolver, each the verdict over all `names`.
pub async fn evaluate_resolvers(
    ctx: &RunContext,
    check: &CheckUnit,
    mnemo: &str,
    resolvers: &[IpAddr],
    names: &[String],
) -> OutcomeTuple {
    let mut out = OutcomeTuple::new();

    for &resolver in resolvers {
        let mut per_name = OutcomeTuple::new();
        for name in names {
            per_name.record(query_name_from_resolver(ctx, check, name, resolver).await);
            check.track();
        }

        let outcome = verdict(&per_name);
        match outcome {
            Some(ResultCode::Failure) => check.error(
                format!("QUERY_{mnemo}_FAILS"),
                format!("Resolver {resolver} is not answering queries"),
            ),
            Some(ResultCode::Partial) => check.warning(
                format!("QUERY_{mnemo}_FLAKY"),
                format!("Resolver {resolver} failed to answer some queries"),
            ),
            Some(ResultCode::Success) => check.info(
                format!("QUERY_{mnemo}_WORKS"),
                format!("Resolver {resolver} answered all queries"),
            ),
            None => {}
        }
        if let Some(code) = outcome {
            out.record(code);
        }
        check.track();
    }

    out
}

/// Pings `target` and grades the packet loss: none is success, total loss
/// is failure, anything between is partial.
pub async fn ping(ctx: &RunContext, check: &CheckUnit, target: IpAddr, mnemo: &str) -> ResultCode {
    check.info(format!("PING_{mnemo}"), format!("Pinging {target}"));

    let stats = match ctx.pinger().ping(target, ctx.settings().main.ping_packets).await {
        Ok(stats) => stats,
        Err(e) => {
            check.warning(
                format!("PING_{mnemo}_FAILS"),
                format!("Server {target} is not reachable ({e})"),
            );
            return ResultCode::Failure;
        }
    };

    check.detail(
        "PING_RESULTS",
        format!(
            "{} packets transmitted, {} packets received, {}% packet loss",
            stats.transmitted, stats.received, stats.loss_percent
        ),
    );

    if stats.loss_percent <= 0.0 {
        check.info(
            format!("PING_{mnemo}_WORKS"),
            format!("Server {target} is reachable"),
        );
        ResultCode::Success
    } else if stats.loss_percent >= 100.0 {
        check.warning(
            format!("PING_{mnemo}_FAILS"),
            format!("Server {target} is not reachable"),
        );
        ResultCode::Failure
    } else {
        check.warning(
            format!("PING_{mnemo}_WARNING"),
            format!("Server {target} shows packet loss"),
        );
        ResultCode::Partial
    }
}

pub async fn ping_servers(
    ctx: &RunContext,
    check: &CheckUnit,
    mnemo: &str,
    servers: &[IpAddr],
) -> OutcomeTuple {
    let mut out = OutcomeTuple::new();
    for &server in servers {
        out.record(ping(ctx, check, server, mnemo).await);
        check.track();
    }
    out
}

/// Runs the reachability and answering dimensions over groups of resolvers.
pub struct ResolverProbe<'a> {
    ctx: &'a RunContext,
    check: &'a CheckUnit,
    mnemo: &'a str,
    kind: &'a str,
    names: Option<&'a [String]>,
}

impl<'a> ResolverProbe<'a> {
    /// Reports `{MNEMO}_NO_NAMES` once when the answering dimension is
    /// enabled but nothing is configured to look up.
    pub fn new(ctx: &'a RunContext, check: &'a CheckUnit, mnemo: &'a str, kind: &'a str) -> Self {
        let dns = &ctx.settings().dns;
        let names = if !dns.query {
            None
        } else if dns.names.is_empty() {
            check.fatal(
                format!("{mnemo}_NO_NAMES"),
                "The list of names to look up is empty",
            );
            None
        } else {
            Some(dns.names.as_slice())
        };
        Self {
            ctx,
            check,
            mnemo,
            kind,
            names,
        }
    }

    pub async fn test_family(&self, family: IpVersion, resolvers: &[IpAddr]) {
        let subject = |test: &'static str, verb: &'static str| RollUpSubject {
            test,
            mnemo: self.mnemo,
            family,
            kind: self.kind,
            verb,
        };

        if self.ctx.settings().dns.ping {
            let tuple = ping_servers(self.ctx, self.check, self.mnemo, resolvers).await;
            report_roll_up(self.check, subject("PING", "reachable"), resolvers, &tuple);
        }

        if let Some(names) = self.names {
            let tuple = evaluate_resolvers(self.ctx, self.check, self.mnemo, resolvers, names).await;
            report_roll_up(self.check, subject("QUERY", "answering"), resolvers, &tuple);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ResultCode::*;

    fn tuple(codes: &[ResultCode]) -> OutcomeTuple {
        codes.iter().copied().collect()
    }

    #[test]
    fn test_verdict_rules() {
        assert_eq!(verdict(&tuple(&[])), None);
        assert_eq!(verdict(&tuple(&[Success, Success])), Some(Success));
        assert_eq!(verdict(&tuple(&[Failure, Failure])), Some(Failure));
        assert_eq!(verdict(&tuple(&[Success, Failure])), Some(Partial));
        assert_eq!(verdict(&tuple(&[Success, Partial])), Some(Partial));
        assert_eq!(verdict(&tuple(&[Partial, Failure])), Some(Partial));
    }

    #[test]
    fn test_roll_up_is_order_independent() {
        let codes = [Success, Failure, Partial, Success];
        let expected = roll_up(&tuple(&codes));
        for rotation in 0..codes.len() {
            let mut permuted = codes.to_vec();
            permuted.rotate_left(rotation);
            permuted.reverse();
            assert_eq!(roll_up(&tuple(&permuted)), expected);
        }
        assert_eq!(expected, Some(RollUp::Partial));
    }

    #[test]
    fn test_roll_up_severities() {
        assert_eq!(roll_up(&tuple(&[Success])).unwrap().severity(), Severity::Info);
        assert_eq!(roll_up(&tuple(&[Failure])).unwrap().severity(), Severity::Error);
        assert_eq!(roll_up(&tuple(&[Partial])).unwrap().suffix(), "PARTIAL");
        assert_eq!(roll_up(&OutcomeTuple::new()), None);
    }

    #[test]
    fn test_tuple_counts() {
        let t = tuple(&[Success, Failure, Failure]);
        assert_eq!(t.count(Failure), 2);
        assert_eq!(t.total(), 3);
        assert!(!t.is_empty());
    }
}
