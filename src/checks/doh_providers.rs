//! DNS-over-HTTPS check: every configured name is looked up at every
//! provider whose family is enabled, and the addresses that come back are
//! classified against the provider CIDR table.

use crate::context::RunContext;
use crate::dns::doh::{build_query_url, parse_doh_response, DohProvider, DohTransport};
use crate::findings::CheckUnit;
use futures::future::BoxFuture;
use std::sync::Arc;

pub const NAME: &str = "doh_providers";

/// Registry entry point for `doh_providers`.
pub fn run(ctx: Arc<RunContext>, check: CheckUnit) -> BoxFuture<'static, ()> {
    Box::pin(async move { check_doh_providers(&ctx, &check).await })
}

/// Runs the DoH lookups for one check unit.
///
/// Configuration problems are fatal for this check only and reported once:
/// no names (`DOH_NO_NAMES`), an unparseable provider line
/// (`DOH_BAD_PROVIDER`) or an HTTP client that cannot be built
/// (`DOH_CLIENT_ERROR`). Per lookup the findings are:
///
/// - `DOH_PROVIDER_LOOKUP_IPV{4,6}` before the request
/// - `DOH_PROVIDER_{REQUEST,GET,READ}_ERROR` when the fetch fails
/// - `DOH_PROVIDER_LOOKUP_IPV{4,6}_RESULT_{OK,ERROR}` for the parsed reply
/// - one `PROVIDER_CIDR_*` finding per returned address
///
/// A failed lookup never stops the remaining ones.
pub async fn check_doh_providers(ctx: &RunContext, check: &CheckUnit) {
    let names = &ctx.settings().dns.names;
    if names.is_empty() {
        check.fatal("DOH_NO_NAMES", "The list of names to look up is empty");
        return;
    }

    let providers = match ctx.settings().doh.providers() {
        Ok(providers) => providers,
        Err(e) => {
            check.fatal("DOH_BAD_PROVIDER", e.to_string());
            return;
        }
    };

    let transport = match ctx.doh() {
        Ok(transport) => transport,
        Err(e) => {
            check.fatal("DOH_CLIENT_ERROR", e.to_string());
            return;
        }
    };

    for provider in providers
        .iter()
        .filter(|p| ctx.families().enabled(p.family))
    {
        for name in names {
            lookup(ctx, check, transport.as_ref(), provider, name).await;
            check.track();
        }
    }
}

/// One name at one provider.
async fn lookup(
    ctx: &RunContext,
    check: &CheckUnit,
    transport: &dyn DohTransport,
    provider: &DohProvider,
    name: &str,
) {
    let af = provider.family.digit();
    check.detail(
        format!("DOH_PROVIDER_LOOKUP_IPV{af}"),
        format!(
            "Checking for name {} via {} (format: {}) using {}",
            name, provider.url, provider.format, provider.family
        ),
    );

    let url = match build_query_url(provider, name) {
        Ok(url) => url,
        Err(e) => {
            check.error("DOH_PROVIDER_REQUEST_ERROR", format!("Error: {e}"));
            return;
        }
    };

    let body = match transport.get(&url, provider.format.accept()).await {
        Ok(body) => body,
        Err(e) => {
            check.error(e.mnemonic(), format!("Error: {e}"));
            return;
        }
    };

    let addrs = match parse_doh_response(provider.format, &body) {
        Ok(addrs) => addrs,
        Err(e) => {
            check.error(
                format!("DOH_PROVIDER_LOOKUP_IPV{af}_RESULT_ERROR"),
                format!("Error: {e}"),
            );
            return;
        }
    };

    check.info(
        format!("DOH_PROVIDER_LOOKUP_IPV{af}_RESULT_OK"),
        format!("Result for {}: [{}]", name, addrs.join(", ")),
    );

    for addr in &addrs {
        ctx.providers().report(check, addr, name);
    }
}
