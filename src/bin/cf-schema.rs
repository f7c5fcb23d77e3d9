use anyhow::{Result, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;
use std::path::PathBuf;

use cloudflare_api_tools::cli::{debug_arg, flag_or_env, setup_logging};
use cloudflare_api_tools::output;
use cloudflare_api_tools::schema::query::{self, EXPAND_DEPTH};
use cloudflare_api_tools::schema::render;
use cloudflare_api_tools::schema::{DEFAULT_SCHEMA_URL, SchemaCache, SchemaStore};

const EXAMPLES: &str = "\
Examples:
  cf-schema search dns        Find DNS-related endpoints
  cf-schema search zone       Find zone management endpoints
  cf-schema get /zones        Get spec for /zones endpoint
  cf-schema list /accounts    List all /accounts/* endpoints";

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let matches = build_cli().get_matches();
    let (name, sub) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("command required"))?;
    setup_logging(sub.get_flag("debug"), LevelFilter::Info)?;
    let store = open_store(sub)?;
    let json = sub.get_flag("json");

    match name {
        "fetch" => handle_fetch(&store, sub, json),
        "search" => handle_search(&store, sub, json),
        "get" => handle_get(&store, sub, json),
        "list" => handle_list(&store, sub, json),
        "info" => handle_info(&store, json),
        other => Err(anyhow!("Unknown command: {other}")),
    }
}

fn open_store(matches: &ArgMatches) -> Result<SchemaStore> {
    let dir = match flag_or_env(matches, "cache_dir", "CLOUDFLARE_SCHEMA_CACHE_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => SchemaCache::default_dir()?,
    };
    let url = flag_or_env(matches, "schema_url", "CLOUDFLARE_SCHEMA_URL")
        .unwrap_or_else(|| DEFAULT_SCHEMA_URL.to_string());
    log::debug!("schema cache {} (source {})", dir.display(), url);
    SchemaStore::new(SchemaCache::new(dir), url)
}

fn handle_fetch(store: &SchemaStore, matches: &ArgMatches, json: bool) -> Result<i32> {
    let schema = store.load(matches.get_flag("force"))?;
    let info = query::schema_info(&schema);
    if json {
        output::write_json(&serde_json::to_value(&info)?, true)?;
    } else {
        output::write_lines(render::fetch_lines(&info))?;
    }
    Ok(0)
}

fn handle_search(store: &SchemaStore, matches: &ArgMatches, json: bool) -> Result<i32> {
    let words: Vec<String> = matches
        .get_many::<String>("query")
        .ok_or_else(|| anyhow!("Usage: cf-schema search <query>"))?
        .cloned()
        .collect();
    let query_text = words.join(" ");

    let schema = store.load(false)?;
    let hits = query::search(&query_text, &schema);
    if json {
        output::write_json(&serde_json::to_value(&hits)?, true)?;
    } else {
        output::write_lines(render::search_lines(&query_text, &hits))?;
    }
    Ok(0)
}

fn handle_get(store: &SchemaStore, matches: &ArgMatches, json: bool) -> Result<i32> {
    let path = matches
        .get_one::<String>("path")
        .ok_or_else(|| anyhow!("Usage: cf-schema get <path>"))?;

    let schema = store.load(false)?;
    let Some(endpoint) = query::get_endpoint(path, &schema) else {
        let suggestions = query::similar_paths(path, &schema);
        if json {
            output::write_json(
                &serde_json::json!({ "error": "not_found", "path": path, "suggestions": suggestions }),
                true,
            )?;
        } else {
            output::write_lines(render::not_found_lines(path, &suggestions))?;
        }
        return Ok(1);
    };

    // `get` output is JSON either way.
    output::write_json(&endpoint.expanded(&schema, EXPAND_DEPTH), true)?;
    Ok(0)
}

fn handle_list(store: &SchemaStore, matches: &ArgMatches, json: bool) -> Result<i32> {
    let prefix = matches
        .get_one::<String>("prefix")
        .map(String::as_str)
        .unwrap_or("");

    let schema = store.load(false)?;
    let entries = query::list_paths(prefix, &schema);
    if json {
        output::write_json(&serde_json::to_value(&entries)?, true)?;
    } else {
        output::write_lines(render::list_lines(&entries))?;
    }
    Ok(0)
}

fn handle_info(store: &SchemaStore, json: bool) -> Result<i32> {
    let schema = store.load(false)?;
    let info = query::schema_info(&schema);
    if json {
        output::write_json(&serde_json::to_value(&info)?, true)?;
    } else {
        output::write_lines(render::info_lines(&info))?;
    }
    Ok(0)
}

fn build_cli() -> Command {
    Command::new("cf-schema")
        .about("Fetch, cache, and query the Cloudflare API OpenAPI schema")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .after_help(EXAMPLES)
        .arg(
            Arg::new("cache_dir")
                .long("cache-dir")
                .global(true)
                .value_name("DIR")
                .help("Cache directory (env: CLOUDFLARE_SCHEMA_CACHE_DIR, default ~/.cache/cloudflare-api)"),
        )
        .arg(
            Arg::new("schema_url")
                .long("schema-url")
                .global(true)
                .value_name("URL")
                .help("OpenAPI document URL (env: CLOUDFLARE_SCHEMA_URL)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit machine-readable JSON"),
        )
        .arg(debug_arg())
        .subcommand(
            Command::new("fetch")
                .about("Download or update the schema (cached 24h)")
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Ignore a fresh cache and download again"),
                ),
        )
        .subcommand(
            Command::new("search")
                .about("Search endpoints by keyword")
                .arg(
                    Arg::new("query")
                        .required(true)
                        .num_args(1..)
                        .value_name("QUERY"),
                ),
        )
        .subcommand(
            Command::new("get")
                .about("Get the full spec for an endpoint path")
                .arg(Arg::new("path").required(true).value_name("PATH")),
        )
        .subcommand(
            Command::new("list")
                .about("List all paths, optionally filtered by prefix")
                .arg(Arg::new("prefix").value_name("PREFIX")),
        )
        .subcommand(Command::new("info").about("Show schema metadata and stats"))
}
