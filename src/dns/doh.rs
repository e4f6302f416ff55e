//! DNS-over-HTTPS: provider lines, query URLs for the JSON and RFC 8484
//! flavours, and parsing of both reply formats down to addresses.

use super::{parse_response, DnsQuery, QueryType, RecordKind};
use crate::config::ConfigError;
use crate::network::IpVersion;
use crate::utils::{NetworkError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use futures::future::BoxFuture;
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// How a DoH provider expects the question and returns the answer.
///
/// - **`Json`**: `GET ?name=..&type=..`, answered with a JSON document
/// - **`Rfc8484`**: `GET ?dns=<base64url wire query>`, answered with a raw DNS message
///
/// # Examples
/// ```rust
/// use netiscope::dns::doh::DohFormat;
///
/// assert_eq!(DohFormat::Json.accept(), "application/dns-json");
/// assert_eq!(DohFormat::Rfc8484.to_string(), "rfc8484");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DohFormat {
    /// `application/dns-json`, as served by Google and Cloudflare.
    Json,
    /// Wire format, base64url in the `dns` GET parameter.
    Rfc8484,
}

impl DohFormat {
    pub const fn label(self) -> &'static str {
        match self {
            DohFormat::Json => "json",
            DohFormat::Rfc8484 => "rfc8484",
        }
    }

    pub const fn accept(self) -> &'static str {
        match self {
            DohFormat::Json => "application/dns-json",
            DohFormat::Rfc8484 => "application/dns-message",
        }
    }
}

impl fmt::Display for DohFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A configured provider, parsed from a `4|6,json|rfc8484,base-url` line.
///
/// The family decides both the record type asked for (A or AAAA) and the
/// family the answers are expected in.
///
/// # Examples
/// ```rust
/// use netiscope::dns::doh::{DohFormat, DohProvider};
/// use netiscope::network::IpVersion;
///
/// let provider: DohProvider = "6,rfc8484,https://cloudflare-dns.com/dns-query"
///     .parse()
///     .unwrap();
/// assert_eq!(provider.family, IpVersion::V6);
/// assert_eq!(provider.format, DohFormat::Rfc8484);
/// assert!("4,xml,https://dns.example".parse::<DohProvider>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DohProvider {
    pub family: IpVersion,
    pub format: DohFormat,
    pub url: String,
}

impl FromStr for DohProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidDohProvider(s.to_string());
        // the URL may itself contain commas
        let mut fields = s.splitn(3, ',').map(str::trim);
        let family = match fields.next() {
            Some("4") => IpVersion::V4,
            Some("6") => IpVersion::V6,
            _ => return Err(invalid()),
        };
        let format = match fields.next().map(str::to_ascii_lowercase).as_deref() {
            Some("json") => DohFormat::Json,
            Some("rfc8484") => DohFormat::Rfc8484,
            _ => return Err(invalid()),
        };
        let url = match fields.next() {
            Some(url) if url.starts_with("https://") || url.starts_with("http://") => url,
            _ => return Err(invalid()),
        };
        Ok(Self {
            family,
            format,
            url: url.to_string(),
        })
    }
}

/// The GET URL for looking up `name` at `provider`. A over IPv4 providers,
/// AAAA over IPv6 ones.
///
/// Parameters are appended form-encoded to whatever query the base URL
/// already carries. RFC 8484 queries use a zero transaction ID so that
/// identical questions stay cacheable.
///
/// # Errors
/// Returns `NetworkError::Http` if the base URL does not parse.
///
/// # Examples
/// ```rust
/// use netiscope::dns::doh::{build_query_url, DohProvider};
///
/// let provider: DohProvider = "4,json,https://dns.google/resolve".parse().unwrap();
/// let url = build_query_url(&provider, "example.com").unwrap();
/// assert_eq!(url, "https://dns.google/resolve?name=example.com&type=A&do=true");
/// ```
pub fn build_query_url(provider: &DohProvider, name: &str) -> Result<String> {
    let qtype = QueryType::for_family(provider.family);
    let mut url = Url::parse(&provider.url)
        .map_err(|e| NetworkError::Http(format!("invalid DoH URL {}: {}", provider.url, e)))?;
    match provider.format {
        DohFormat::Json => {
            url.query_pairs_mut()
                .append_pair("name", name)
                .append_pair("type", &qtype.to_string())
                .append_pair("do", "true");
        }
        DohFormat::Rfc8484 => {
            let built = DnsQuery::new(name, qtype)
                .with_dnssec_ok(true)
                .with_nsid(true)
                .with_zero_id(true)
                .build()?;
            url.query_pairs_mut()
                .append_pair("dns", &URL_SAFE_NO_PAD.encode(built.wire()));
        }
    }
    Ok(url.into())
}

#[derive(Debug, Deserialize)]
struct JsonReply {
    #[serde(rename = "Status")]
    status: Option<i64>,
    #[serde(rename = "Answer", default)]
    answer: Vec<JsonAnswer>,
}

#[derive(Debug, Deserialize)]
struct JsonAnswer {
    #[serde(rename = "type")]
    rtype: u16,
    data: String,
}

/// Addresses (types 1 and 28) of a JSON reply. A non-zero `Status` is an error.
pub fn parse_json_response(body: &[u8]) -> Result<Vec<String>> {
    let reply: JsonReply = serde_json::from_slice(body)
        .map_err(|e| NetworkError::Protocol(format!("Failed to parse DoH response: {}", e)))?;

    match reply.status {
        Some(0) => {}
        Some(status) => {
            return Err(NetworkError::Protocol(format!(
                "result status is {}",
                status
            )))
        }
        None => {
            return Err(NetworkError::Protocol(
                "unable to find result status (is this a DoH URL?)".to_string(),
            ))
        }
    }

    Ok(reply
        .answer
        .into_iter()
        .filter(|a| a.rtype == QueryType::A.code() || a.rtype == QueryType::Aaaa.code())
        .map(|a| a.data)
        .collect())
}

/// Addresses of an RFC 8484 reply, through the normal parse path.
pub fn parse_wire_response(body: &[u8]) -> Result<Vec<String>> {
    let parsed = parse_response(body)?;
    let mut addrs = parsed.get(RecordKind::A).to_vec();
    addrs.extend_from_slice(parsed.get(RecordKind::Aaaa));
    Ok(addrs)
}

/// Addresses of a DoH reply body in the provider's format.
pub fn parse_doh_response(format: DohFormat, body: &[u8]) -> Result<Vec<String>> {
    match format {
        DohFormat::Json => parse_json_response(body),
        DohFormat::Rfc8484 => parse_wire_response(body),
    }
}

/// Where an HTTP fetch went wrong.
#[derive(Debug, Error)]
pub enum DohFetchError {
    #[error("{0}")]
    Request(String),
    #[error("{0}")]
    Get(String),
    #[error("{0}")]
    Read(String),
}

impl DohFetchError {
    /// The finding mnemonic this failure is reported under.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            DohFetchError::Request(_) => "DOH_PROVIDER_REQUEST_ERROR",
            DohFetchError::Get(_) => "DOH_PROVIDER_GET_ERROR",
            DohFetchError::Read(_) => "DOH_PROVIDER_READ_ERROR",
        }
    }
}

/// Fetches one DoH URL and hands back the body.
///
/// Implemented over HTTP by [`HttpDohTransport`]; tests substitute canned
/// bodies. A non-2xx status is a [`DohFetchError::Get`].
pub trait DohTransport: Send + Sync {
    fn get<'a>(
        &'a self,
        url: &'a str,
        accept: &'static str,
    ) -> BoxFuture<'a, std::result::Result<Vec<u8>, DohFetchError>>;
}

/// [`DohTransport`] backed by a shared `reqwest` client.
pub struct HttpDohTransport {
    client: Client,
}

impl HttpDohTransport {
    /// Creates a transport whose requests give up after `timeout`.
    ///
    /// # Errors
    /// Returns `NetworkError::Http` if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("Netiscope/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NetworkError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl DohTransport for HttpDohTransport {
    fn get<'a>(
        &'a self,
        url: &'a str,
        accept: &'static str,
    ) -> BoxFuture<'a, std::result::Result<Vec<u8>, DohFetchError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .header(ACCEPT, accept)
                .send()
                .await
                .map_err(|e| {
                    if e.is_builder() {
                        DohFetchError::Request(e.to_string())
                    } else {
                        DohFetchError::Get(e.to_string())
                    }
                })?;

            if !response.status().is_success() {
                return Err(DohFetchError::Get(format!(
                    "DoH server returned status: {}",
                    response.status()
                )));
            }

            let body = response
                .bytes()
                .await
                .map_err(|e| DohFetchError::Read(e.to_string()))?;
            Ok(body.to_vec())
        })
    }
}
