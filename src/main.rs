use clap::Parser;
use colored::*;
use netiscope::checks::Registry;
use netiscope::cidr::ProviderCidrTable;
use netiscope::cli::Cli;
use netiscope::config::{
    candidate_paths, find_file, load_provider_cidrs, ConfigError, Settings, CIDR_FILE_NAME,
    CONFIG_FILE_NAME,
};
use netiscope::context::RunContext;
use netiscope::findings::{Finding, Severity};
use netiscope::network::{AddressFamilies, IpVersion};
use netiscope::orchestrator::Orchestrator;
use netiscope::output::{OutputFormat, Printer};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        })
        .init();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    };
    let providers = match load_providers(&cli) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    let threshold = cli
        .loglevel
        .or_else(|| settings.main.loglevel.as_deref()?.parse().ok())
        .unwrap_or(Severity::Info);
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };
    let mut printer = Printer::stdout(threshold, format);

    let names = cli.check_names(|section| settings.check_list(section));
    let families = AddressFamilies::new(
        cli.skip4 || settings.main.skip_ipv4,
        cli.skip6 || settings.main.skip_ipv6,
    )
    .with_force(cli.force4, cli.force6);

    printer.print(&Finding::admin(
        "START",
        format!("Netiscope v{} starting", env!("CARGO_PKG_VERSION")),
    ));
    for family in IpVersion::BOTH {
        if families.skipped_by_config(family) {
            printer.print(&Finding::admin(
                if family == IpVersion::V4 {
                    "SKIP_IPV4"
                } else {
                    "SKIP_IPV6"
                },
                format!("Skipping {family} checks"),
            ));
        }
    }

    let ctx = RunContext::new(settings)
        .with_providers(providers)
        .with_families(families);
    let orchestrator = Orchestrator::new(Registry::builtin(), Arc::new(ctx)).with_verbose(cli.verbose);
    orchestrator.run(&names, |finding| printer.print(finding)).await;

    printer.print(&Finding::admin("FINISH", "Netiscope finished"));
}

fn load_settings(cli: &Cli) -> Result<Settings, ConfigError> {
    let path = find_file(&candidate_paths(cli.config.as_deref(), CONFIG_FILE_NAME))?;
    log::info!("using config file {}", path.display());
    Settings::load(path)
}

/// A missing CIDR file is not an error, only classification is lost.
fn load_providers(cli: &Cli) -> Result<ProviderCidrTable, ConfigError> {
    match find_file(&candidate_paths(cli.cidr.as_deref(), CIDR_FILE_NAME)) {
        Ok(path) => {
            log::info!("using provider CIDR file {}", path.display());
            load_provider_cidrs(path)
        }
        Err(e) => {
            log::warn!("{}; provider classification disabled", e);
            Ok(ProviderCidrTable::new())
        }
    }
}
