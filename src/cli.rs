//! Pieces shared by both binaries.

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches};
use env_logger::Builder;
use log::LevelFilter;
use std::env;

pub fn setup_logging(debug: bool, default_level: LevelFilter) -> Result<()> {
    let rust_log = env::var("RUST_LOG").ok();
    logging_builder(debug, default_level, rust_log.as_deref()).init();
    Ok(())
}

/// `default_level`, overridden by `RUST_LOG` directives, overridden by `--debug`.
fn logging_builder(debug: bool, default_level: LevelFilter, rust_log: Option<&str>) -> Builder {
    let mut builder = Builder::new();
    builder.filter_level(default_level);
    if let Some(filters) = rust_log {
        builder.parse_filters(filters);
    }
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    builder
}

/// Flag value first, then the environment variable. Empty values count as unset.
pub fn flag_or_env(matches: &ArgMatches, id: &str, var: &str) -> Option<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .or_else(|| env::var(var).ok())
        .filter(|v| !v.is_empty())
}

pub fn debug_arg() -> Arg {
    Arg::new("debug")
        .long("debug")
        .global(true)
        .action(ArgAction::SetTrue)
        .help("Enable debug logging")
}
