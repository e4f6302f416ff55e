use crate::config::DEFAULT_CHECK_SECTION;
use crate::findings::Severity;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "netiscope")]
#[command(about = "Concurrent network health diagnostics")]
#[command(version)]
pub struct Cli {
    /// Main configuration file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Provider CIDR file
    #[arg(short = 'C', long = "cidr")]
    pub cidr: Option<PathBuf>,

    /// Section of [checks] to run
    #[arg(short = 's', long = "section", default_value = DEFAULT_CHECK_SECTION)]
    pub section: String,

    /// Run only this check, ignoring the configured list
    #[arg(long)]
    pub check: Option<String>,

    #[arg(long, conflicts_with = "force4")]
    pub skip4: bool,

    #[arg(long, conflicts_with = "force6")]
    pub skip6: bool,

    /// Keep IPv4 enabled even if no usable address is found
    #[arg(long)]
    pub force4: bool,

    /// Keep IPv6 enabled even if no usable address is found
    #[arg(long)]
    pub force6: bool,

    /// Lowest severity to print: detail, info, warning or error
    #[arg(short = 'l', long = "loglevel")]
    pub loglevel: Option<Severity>,

    #[arg(short, long)]
    pub verbose: bool,

    /// One JSON object per finding
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// The check names to run: `--check` wins over the configured section.
    pub fn check_names(&self, configured: impl FnOnce(&str) -> Vec<String>) -> Vec<String> {
        match &self.check {
            Some(name) => vec![name.clone()],
            None => configured(&self.section),
        }
    }
}
