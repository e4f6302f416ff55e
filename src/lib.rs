pub mod checks;
pub mod cidr;
pub mod cli;
pub mod config;
pub mod context;
pub mod dns;
pub mod evaluation;
pub mod findings;
pub mod network;
pub mod orchestrator;
pub mod output;
pub mod utils;

pub use findings::*;
pub use utils::*;
