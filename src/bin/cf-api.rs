use anyhow::{Result, anyhow};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;
use serde_json::Value;

use cloudflare_api_tools::cli::{debug_arg, flag_or_env, setup_logging};
use cloudflare_api_tools::client::{
    ApiMethod, Auth, CloudflareClient, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS,
};
use cloudflare_api_tools::{envelope, output, sources};

const EXAMPLES: &str = "\
Examples:
  cf-api GET /zones
  cf-api GET \"/zones?name=example.com\"
  cf-api POST /zones '{\"name\":\"example.com\",\"account\":{\"id\":\"...\"}}'
  cf-api PATCH /zones/ZONE_ID/settings/ssl @ssl.json
  cf-api verify";

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
    setup_logging(matches.get_flag("debug"), LevelFilter::Warn)?;
    let config = load_config(&matches);

    let method_arg = matches
        .get_one::<String>("method")
        .ok_or_else(|| anyhow!("method required"))?;
    if method_arg.eq_ignore_ascii_case("verify") {
        return handle_verify(&config);
    }

    let method: ApiMethod = method_arg.parse()?;
    let path = matches
        .get_one::<String>("path")
        .ok_or_else(|| anyhow!("Usage: cf-api {method} <path> [json_body]"))?;
    let body = match matches.get_one::<String>("body") {
        Some(raw) => Some(sources::read_body(raw)?),
        None => None,
    };

    let response = forward(&config, method, path, body.as_deref())?;
    render(&response, config.pretty)?;

    Ok(exit_code(&response))
}

/// Missing credentials and failed calls come back as a `success: false`
/// envelope so stdout always carries JSON.
fn forward(config: &Config, method: ApiMethod, path: &str, body: Option<&str>) -> Result<Value> {
    let auth = match config.auth() {
        Ok(auth) => auth,
        Err(err) => return Ok(envelope::failure(&err.to_string())),
    };
    let client = CloudflareClient::new(config.base_url.clone(), Some(config.timeout))?;
    Ok(client
        .request(method, path, &auth, body)
        .unwrap_or_else(|err| envelope::failure(&format!("{err:#}"))))
}

struct Config {
    base_url: String,
    api_token: Option<String>,
    api_key: Option<String>,
    email: Option<String>,
    timeout: u64,
    pretty: bool,
}

impl Config {
    fn auth(&self) -> Result<Auth> {
        Auth::resolve(
            self.api_token.as_deref(),
            self.api_key.as_deref(),
            self.email.as_deref(),
        )
    }
}

fn load_config(matches: &ArgMatches) -> Config {
    Config {
        base_url: flag_or_env(matches, "base_url", "CLOUDFLARE_BASE_URL")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        api_token: flag_or_env(matches, "api_token", "CLOUDFLARE_API_TOKEN"),
        api_key: flag_or_env(matches, "api_key", "CLOUDFLARE_API_KEY"),
        email: flag_or_env(matches, "email", "CLOUDFLARE_EMAIL"),
        timeout: matches
            .get_one::<u64>("timeout")
            .copied()
            .unwrap_or(DEFAULT_TIMEOUT_SECS),
        pretty: !matches.get_flag("compact"),
    }
}

fn handle_verify(config: &Config) -> Result<i32> {
    let auth = match config.auth() {
        Ok(auth) => auth,
        Err(err) => {
            output::write_stdout_line(&err.to_string())?;
            return Ok(1);
        }
    };
    output::write_stdout_line(auth.describe())?;

    let client = CloudflareClient::new(config.base_url.clone(), Some(config.timeout))?;
    let response = client
        .verify(&auth)
        .unwrap_or_else(|err| envelope::failure(&format!("{err:#}")));
    render(&response, config.pretty)?;
    Ok(exit_code(&response))
}

fn render(response: &Value, pretty: bool) -> Result<()> {
    output::write_json(response, pretty)?;
    let trailer = envelope::summarize(response);
    if !trailer.is_empty() {
        eprintln!();
        for line in trailer {
            eprintln!("{line}");
        }
    }
    Ok(())
}

fn exit_code(response: &Value) -> i32 {
    if envelope::is_success(response) { 0 } else { 1 }
}

fn build_cli() -> Command {
    Command::new("cf-api")
        .about("Make authenticated calls against the Cloudflare v4 API")
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(true)
        .after_help(EXAMPLES)
        .arg(
            Arg::new("method")
                .required(true)
                .value_name("METHOD")
                .help("GET, POST, PUT, PATCH, DELETE, or verify"),
        )
        .arg(
            Arg::new("path")
                .value_name("PATH")
                .help("API path such as /zones, optionally with a query string, or an absolute URL"),
        )
        .arg(
            Arg::new("body")
                .value_name("JSON|@FILE|URL")
                .help("JSON request body (string or source)"),
        )
        .arg(
            Arg::new("api_token")
                .long("api-token")
                .value_name("TOKEN")
                .help("API token (env: CLOUDFLARE_API_TOKEN)"),
        )
        .arg(
            Arg::new("api_key")
                .long("api-key")
                .value_name("KEY")
                .help("Global API key, legacy; needs --email (env: CLOUDFLARE_API_KEY)"),
        )
        .arg(
            Arg::new("email")
                .long("email")
                .value_name("EMAIL")
                .help("Account email for --api-key (env: CLOUDFLARE_EMAIL)"),
        )
        .arg(
            Arg::new("base_url")
                .long("base-url")
                .value_name("URL")
                .help("API base URL (env: CLOUDFLARE_BASE_URL)"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(u64))
                .help("HTTP timeout in seconds (default 30)"),
        )
        .arg(
            Arg::new("compact")
                .long("compact")
                .action(ArgAction::SetTrue)
                .help("Print JSON on a single line"),
        )
        .arg(debug_arg())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cli_definition_is_valid() {
        build_cli().debug_assert();
    }

    #[test]
    fn parses_method_path_and_body() {
        let matches = build_cli()
            .try_get_matches_from([
                "cf-api",
                "post",
                "/zones",
                r#"{"name":"example.com"}"#,
                "--api-token",
                "tok",
                "--timeout",
                "10",
                "--compact",
            ])
            .unwrap();
        let config = load_config(&matches);

        assert_eq!(matches.get_one::<String>("method").unwrap(), "post");
        assert_eq!(matches.get_one::<String>("path").unwrap(), "/zones");
        assert_eq!(config.api_token.as_deref(), Some("tok"));
        assert_eq!(config.timeout, 10);
        assert!(!config.pretty);
        assert_eq!(config.auth().unwrap(), Auth::Token("tok".into()));
    }

    #[test]
    fn verify_needs_no_path() {
        let matches = build_cli()
            .try_get_matches_from(["cf-api", "verify"])
            .unwrap();
        assert!(matches.get_one::<String>("path").is_none());
    }

    #[test]
    fn exit_code_follows_success_flag() {
        assert_eq!(exit_code(&json!({ "success": true })), 0);
        assert_eq!(exit_code(&json!({ "success": false, "errors": [] })), 1);
        assert_eq!(exit_code(&json!([])), 1);
    }

    fn config(base_url: &str, api_token: Option<&str>) -> Config {
        Config {
            base_url: base_url.to_string(),
            api_token: api_token.map(str::to_string),
            api_key: None,
            email: None,
            timeout: 2,
            pretty: true,
        }
    }

    #[test]
    fn missing_credentials_yield_failure_envelope() {
        let response = forward(&config(DEFAULT_BASE_URL, None), ApiMethod::Get, "/zones", None).unwrap();

        assert_eq!(exit_code(&response), 1);
        let message = response["errors"][0]["message"].as_str().unwrap();
        assert!(message.starts_with("No authentication configured"), "got: {message}");
    }

    #[test]
    fn refused_connection_yields_failure_envelope() {
        let response = forward(
            &config("http://127.0.0.1:9", Some("tok")),
            ApiMethod::Get,
            "/zones",
            None,
        )
        .unwrap();

        assert_eq!(exit_code(&response), 1);
        let message = response["errors"][0]["message"].as_str().unwrap();
        assert!(message.starts_with("Connection error"), "got: {message}");
    }
}
