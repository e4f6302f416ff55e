mod common;

use common::*;
use hickory_client::op::ResponseCode;
use hickory_client::rr::RecordType;
use netiscope::checks::Registry;
use netiscope::context::RunContext;
use netiscope::findings::{Finding, Severity};
use netiscope::network::{AddressFamilies, InterfaceAddress};
use netiscope::orchestrator::Orchestrator;
use std::io::Write;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
[main]
ping_packets = 2

[dns]
names = ["example.com", "example.net"]
tlds = ["com"]
random = 1
"#;

fn home_network() -> Vec<InterfaceAddress> {
    vec![
        InterfaceAddress {
            interface: "lo".to_string(),
            ip: "127.0.0.1".parse().unwrap(),
        },
        InterfaceAddress {
            interface: "eth0".to_string(),
            ip: "192.168.1.10".parse().unwrap(),
        },
    ]
}

fn healthy_dns() -> ScriptedDns {
    ScriptedDns::new(|_, question| {
        let owner = question.name().to_string();
        Ok(match question.query_type() {
            RecordType::SOA => Reply::answers(vec![root_soa(
                chrono::Utc::now().format("%Y%m%d01").to_string().parse().unwrap(),
            )]),
            RecordType::NS if owner == "com." => Reply::referral(
                ["a", "b", "c", "d"]
                    .iter()
                    .map(|l| ns("com.", &format!("{l}.gtld-servers.net.")))
                    .collect(),
            ),
            RecordType::A => Reply::answers(vec![a(&owner, Ipv4Addr::new(192, 0, 2, 80))]),
            _ => Reply::rcode(ResponseCode::NXDomain),
        })
    })
}

fn healthy_context(resolv_conf: &NamedTempFile) -> RunContext {
    context(CONFIG)
        .with_families(AddressFamilies::new(false, true))
        .with_dns_transport(Arc::new(healthy_dns()))
        .with_pinger(Arc::new(LosslessPinger))
        .with_resolv_conf(resolv_conf.path())
        .with_interface_source(home_network)
}

fn resolv_conf() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "search example.org\nnameserver 192.0.2.53").unwrap();
    file
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

async fn run_checks(ctx: RunContext, list: &[&str]) -> (Vec<Finding>, netiscope::SeveritySummary) {
    let mut findings = Vec::new();
    let summary = Orchestrator::new(Registry::builtin(), Arc::new(ctx))
        .run(&names(list), |f| findings.push(f.clone()))
        .await;
    (findings, summary)
}

#[tokio::test]
async fn test_full_run_on_a_healthy_network() {
    let conf = resolv_conf();
    let (findings, summary) = run_checks(
        healthy_context(&conf),
        &[
            "network_interfaces",
            "dns_local_resolvers",
            "8888",
            "dns_root_servers",
        ],
    )
    .await;

    let last = findings.last().unwrap();
    assert_eq!(last.mnemonic().as_str(), "SUMMARY");
    assert_eq!(last.severity(), Severity::Admin);
    assert_eq!(last.details(), summary.summary_line());
    assert_eq!(summary.count(Severity::Error), 0);
    assert_eq!(summary.count(Severity::Fatal), 0);

    assert!(has(&findings, "QUERY_LOCAL_DNS_RESOLVER_OK"));
    assert!(has(&findings, "PING_LOCAL_DNS_RESOLVER_OK"));
    assert!(has(&findings, "QUERY_OPEN_DNS_RESOLVER_OK"));
    assert_eq!(find(&findings, "QUERY_ROOT_DNS_SERVER_OK").len(), 13);
    assert_eq!(find(&findings, "CHECKING_DNS_ROOT_SERVER").len(), 13);
    assert!(find(&findings, "QUERY_OPEN_DNS_RESOLVER_OK")
        .iter()
        .all(|f| f.check() == "8888"));

    let ipv4 = find(&findings, "IPV4");
    assert_eq!(ipv4.len(), 1);
    assert_eq!(ipv4[0].details(), "Local address 192.168.1.10 on eth0 (NAT, RFC1918)");
    assert!(!has(&findings, "NO_IPV4"));
}

#[tokio::test]
async fn test_unknown_duplicate_and_empty_names() {
    let conf = resolv_conf();
    let (findings, summary) =
        run_checks(healthy_context(&conf), &["dns_roots", "9999", "9999"]).await;

    let no_check = find(&findings, "NO_CHECK");
    assert_eq!(no_check.len(), 1);
    assert_eq!(no_check[0].details(), "No such check: dns_roots");
    assert_eq!(find(&findings, "DUPLICATE_CHECK").len(), 1);
    assert_eq!(find(&findings, "CHECKING_OPEN_DNS_RESOLVER").len(), 1);
    assert_eq!(summary.count(Severity::Admin), 2);

    let (findings, _) = run_checks(healthy_context(&conf), &[]).await;
    let mnemonics: Vec<&str> = findings.iter().map(|f| f.mnemonic().as_str()).collect();
    assert_eq!(mnemonics, vec!["NO_CHECKS", "SUMMARY"]);
}

#[tokio::test]
async fn test_failures_are_findings_not_crashes() {
    let ctx = context(CONFIG)
        .with_families(AddressFamilies::new(false, true))
        .with_dns_transport(Arc::new(ScriptedDns::new(|_, _| {
            Ok(Reply::rcode(ResponseCode::ServFail))
        })))
        .with_pinger(Arc::new(LosslessPinger))
        .with_resolv_conf("/nonexistent/resolv.conf")
        .with_interface_source(Vec::new);

    let (findings, summary) = run_checks(
        ctx,
        &["network_interfaces", "dns_local_resolvers", "1111"],
    )
    .await;

    assert!(has(&findings, "NO_INTERFACES"));
    assert!(has(&findings, "NO_RESOLV_CONF"));
    assert!(has(&findings, "QUERY_OPEN_DNS_RESOLVER_FAIL"));
    assert!(has(&findings, "PING_OPEN_DNS_RESOLVER_OK"));
    assert!(summary.count(Severity::Error) > 0);
    assert_eq!(findings.last().unwrap().mnemonic().as_str(), "SUMMARY");
}

#[tokio::test]
async fn test_missing_names_and_tlds_are_fatal_once() {
    let ctx = context("[dns]\nping = false\n")
        .with_families(AddressFamilies::new(false, true))
        .with_dns_transport(Arc::new(healthy_dns()));
    let (findings, summary) = run_checks(
        ctx,
        &["dns_open_resolvers", "dns_root_servers", "doh_providers"],
    )
    .await;

    assert_eq!(find(&findings, "OPEN_DNS_RESOLVER_NO_NAMES").len(), 1);
    assert_eq!(find(&findings, "ROOT_NO_TLDS").len(), 1);
    assert_eq!(find(&findings, "DOH_NO_NAMES").len(), 1);
    assert_eq!(summary.count(Severity::Fatal), 3);
}

#[tokio::test]
async fn test_interface_check_disables_unroutable_family() {
    let ctx = Arc::new(
        context("[dns]\nping = false\n")
            .with_families(AddressFamilies::new(false, false))
            .with_interface_source(home_network),
    );
    let summary = Orchestrator::new(Registry::builtin(), Arc::clone(&ctx))
        .run(&names(&["network_interfaces"]), |_| {})
        .await;

    assert_eq!(summary.count(Severity::Warning), 1);
    assert!(ctx.families().enabled(netiscope::network::IpVersion::V4));
    assert!(!ctx.families().enabled(netiscope::network::IpVersion::V6));
}
