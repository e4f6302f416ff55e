use super::*;
use hickory_client::op::ResponseCode;
use hickory_client::rr::rdata::{A, AAAA, MX, NS, SOA};
use std::net::{Ipv4Addr, Ipv6Addr};
use tokio::sync::mpsc;

fn name(s: &str) -> Name {
    Name::from_ascii(s).unwrap()
}

fn reply(
    query: &[u8],
    rcode: ResponseCode,
    answers: Vec<Record>,
    authority: Vec<Record>,
    nsid: Option<&str>,
) -> Vec<u8> {
    let request = Message::from_vec(query).unwrap();
    let mut message = Message::new();
    message
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_response_code(rcode);
    message.add_queries(request.queries().to_vec());
    message.add_answers(answers);
    message.add_name_servers(authority);
    if let Some(nsid) = nsid {
        let mut edns = Edns::new();
        edns.options_mut()
            .insert(EdnsOption::Unknown(3, nsid.as_bytes().to_vec()));
        message.set_edns(edns);
    }
    message.to_vec().unwrap()
}

#[test]
fn test_build_sets_header_and_question() {
    let built = DnsQuery::new("example.com", QueryType::Aaaa)
        .with_recursion(false)
        .build()
        .unwrap();
    let message = Message::from_vec(built.wire()).unwrap();

    assert_eq!(message.id(), built.id());
    assert!(!message.recursion_desired());
    assert!(message.extensions().is_none());
    let question = &message.queries()[0];
    assert_eq!(question.name().to_string(), "example.com.");
    assert_eq!(question.query_type(), RecordType::AAAA);
    assert_eq!(question.query_class(), DNSClass::IN);
}

#[test]
fn test_build_txt_uses_chaos_and_nsid_option() {
    let built = DnsQuery::new("version.bind.", QueryType::Txt)
        .with_nsid(true)
        .with_zero_id(true)
        .build()
        .unwrap();
    let message = Message::from_vec(built.wire()).unwrap();

    assert_eq!(built.id(), 0);
    assert_eq!(message.queries()[0].query_class(), DNSClass::CH);
    let edns = message.extensions().as_ref().unwrap();
    assert_eq!(edns.max_payload(), EDNS_PAYLOAD);
    assert!(edns.option(EdnsCode::NSID).is_some());
}

#[test]
fn test_fqdn_normalization() {
    assert_eq!(DnsQuery::new("example.com", QueryType::A).fqdn(), "example.com.");
    assert_eq!(DnsQuery::new("example.com.", QueryType::A).fqdn(), "example.com.");
    assert_eq!(DnsQuery::new(".", QueryType::Soa).fqdn(), ".");
}

#[test]
fn test_query_type_from_str() {
    assert_eq!("aaaa".parse::<QueryType>().unwrap(), QueryType::Aaaa);
    assert!(matches!(
        "MX".parse::<QueryType>(),
        Err(NetworkError::UnsupportedQueryType(_))
    ));
}

#[test]
fn test_parse_addresses() {
    let built = DnsQuery::new("example.com", QueryType::A).build().unwrap();
    let answers = vec![
        Record::from_rdata(name("example.com."), 60, RData::A(A(Ipv4Addr::new(192, 0, 2, 1)))),
        Record::from_rdata(name("example.com."), 60, RData::A(A(Ipv4Addr::new(192, 0, 2, 2)))),
    ];
    let wire = reply(built.wire(), ResponseCode::NoError, answers, vec![], None);

    let parsed = parse_reply(&built, &wire).unwrap();
    assert_eq!(parsed.get(RecordKind::A), ["192.0.2.1", "192.0.2.2"]);
    assert!(parsed.get(RecordKind::Aaaa).is_empty());
    assert_eq!(parsed.addresses().count(), 2);
}

#[test]
fn test_parse_aaaa_soa_and_nsid() {
    let built = DnsQuery::new(".", QueryType::Soa)
        .with_recursion(false)
        .with_nsid(true)
        .build()
        .unwrap();
    let soa = SOA::new(
        name("a.root-servers.net."),
        name("nstld.verisign-grs.com."),
        2024061200,
        1800,
        900,
        604800,
        86400,
    );
    let answers = vec![
        Record::from_rdata(Name::root(), 86400, RData::SOA(soa)),
        Record::from_rdata(
            name("ns.example."),
            60,
            RData::AAAA(AAAA(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x53))),
        ),
    ];
    let wire = reply(built.wire(), ResponseCode::NoError, answers, vec![], Some("b1.ams"));

    let parsed = parse_reply(&built, &wire).unwrap();
    assert_eq!(parsed.get(RecordKind::Soa), ["a.root-servers.net. 2024061200"]);
    assert_eq!(parsed.get(RecordKind::Aaaa), ["2001:db8::53"]);
    assert_eq!(parsed.get(RecordKind::Nsid), ["b1.ams"]);
}

#[test]
fn test_parse_authority_ns() {
    let built = DnsQuery::new("com", QueryType::Ns)
        .with_recursion(false)
        .build()
        .unwrap();
    let authority = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|l| {
            Record::from_rdata(
                name("com."),
                172800,
                RData::NS(NS(name(&format!("{l}.gtld-servers.net.")))),
            )
        })
        .collect();
    let wire = reply(built.wire(), ResponseCode::NoError, vec![], authority, None);

    let parsed = parse_reply(&built, &wire).unwrap();
    assert_eq!(parsed.get(RecordKind::Ns).len(), 5);
    assert_eq!(parsed.get(RecordKind::Ns)[0], "a.gtld-servers.net.");
}

#[test]
fn test_parse_rejects_id_mismatch() {
    let built = DnsQuery::new("example.com", QueryType::A).build().unwrap();
    let other = DnsQuery::new("example.com", QueryType::A).build().unwrap();
    let mut wire = reply(other.wire(), ResponseCode::NoError, vec![], vec![], None);
    let wrong = built.id().wrapping_add(1).to_be_bytes();
    wire[0] = wrong[0];
    wire[1] = wrong[1];

    assert!(matches!(
        parse_reply(&built, &wire),
        Err(NetworkError::IdMismatch { .. })
    ));
}

#[test]
fn test_parse_rcode_is_error() {
    let built = DnsQuery::new("nosuchtld", QueryType::Ns).build().unwrap();
    let wire = reply(built.wire(), ResponseCode::NXDomain, vec![], vec![], None);

    let err = parse_reply(&built, &wire).unwrap_err();
    assert!(err.is_nxdomain());
    assert_eq!(
        err.to_string(),
        format!("DNS response error ({})", ResponseCode::NXDomain.to_str())
    );
}

#[test]
fn test_parse_unsupported_record_aborts() {
    let built = DnsQuery::new("example.com", QueryType::A).build().unwrap();
    let answers = vec![Record::from_rdata(
        name("example.com."),
        60,
        RData::MX(MX::new(10, name("mail.example.com."))),
    )];
    let wire = reply(built.wire(), ResponseCode::NoError, answers, vec![], None);

    assert!(matches!(
        parse_response(&wire),
        Err(NetworkError::UnsupportedRecord(_))
    ));
}

#[test]
fn test_parse_garbage() {
    assert!(matches!(
        parse_response(&[0x12]),
        Err(NetworkError::Protocol(_))
    ));
}

#[test]
fn test_random_label() {
    let label = random_label(12);
    assert_eq!(label.len(), 12);
    assert!(label.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
}

#[test]
fn test_random_label_digits_are_not_underweighted() {
    let chars: String = (0..200).map(|_| random_label(12)).collect();
    let digits = chars.chars().filter(char::is_ascii_digit).count();
    // 10 of 36 symbols are digits
    let share = digits as f64 / chars.len() as f64;
    assert!((0.22..0.34).contains(&share), "digit share {share}");
}

struct EchoAnswer;

impl DnsTransport for EchoAnswer {
    fn exchange<'a>(
        &'a self,
        _server: SocketAddr,
        query: &'a [u8],
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<Exchange>> {
        let answers = vec![Record::from_rdata(
            name("example.com."),
            60,
            RData::A(A(Ipv4Addr::new(192, 0, 2, 7))),
        )];
        let response = reply(query, ResponseCode::NoError, answers, vec![], None);
        Box::pin(async move {
            Ok(Exchange {
                response,
                rtt: Duration::from_millis(12),
            })
        })
    }
}

#[tokio::test]
async fn test_query_reports_stats() {
    let (ftx, mut frx) = mpsc::unbounded_channel();
    let (ptx, _prx) = mpsc::unbounded_channel();
    let check = CheckUnit::new("8888", ftx, ptx);

    let parsed = query(
        &check,
        &EchoAnswer,
        "192.0.2.53".parse().unwrap(),
        &DnsQuery::new("example.com", QueryType::A),
        Duration::from_secs(1),
    )
    .await
    .unwrap();
    assert_eq!(parsed.get(RecordKind::A), ["192.0.2.7"]);

    let stats = frx.try_recv().unwrap();
    assert_eq!(stats.mnemonic().as_str(), "DNS_QUERY_STATS");
    assert!(stats.details().contains("192.0.2.53:53"));
    assert!(stats.details().contains("12ms"));
}
