use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const VERIFY_PATH: &str = "/user/tokens/verify";
const ERROR_BODY_LIMIT: usize = 500;

/// Credentials for the two schemes the API accepts. A token always wins over
/// a global key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    Token(String),
    KeyEmail { key: String, email: String },
}

impl Auth {
    pub fn resolve(token: Option<&str>, key: Option<&str>, email: Option<&str>) -> Result<Self> {
        if let Some(token) = non_empty(token) {
            return Ok(Auth::Token(token));
        }
        match (non_empty(key), non_empty(email)) {
            (Some(key), Some(email)) => Ok(Auth::KeyEmail { key, email }),
            _ => Err(anyhow!(
                "No authentication configured. Set CLOUDFLARE_API_TOKEN or (CLOUDFLARE_API_KEY + CLOUDFLARE_EMAIL)"
            )),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Auth::Token(_) => "Using API Token authentication",
            Auth::KeyEmail { .. } => "Using API Key + Email authentication",
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl ApiMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiMethod::Get => "GET",
            ApiMethod::Post => "POST",
            ApiMethod::Put => "PUT",
            ApiMethod::Patch => "PATCH",
            ApiMethod::Delete => "DELETE",
        }
    }

    // Some DELETE endpoints (list items, for one) take a JSON body.
    fn allows_body(self) -> bool {
        !matches!(self, ApiMethod::Get)
    }

    fn to_reqwest(self) -> reqwest::Method {
        match self {
            ApiMethod::Get => reqwest::Method::GET,
            ApiMethod::Post => reqwest::Method::POST,
            ApiMethod::Put => reqwest::Method::PUT,
            ApiMethod::Patch => reqwest::Method::PATCH,
            ApiMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl FromStr for ApiMethod {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_uppercase().as_str() {
            "GET" => Ok(ApiMethod::Get),
            "POST" => Ok(ApiMethod::Post),
            "PUT" => Ok(ApiMethod::Put),
            "PATCH" => Ok(ApiMethod::Patch),
            "DELETE" => Ok(ApiMethod::Delete),
            _ => Err(anyhow!(
                "Unknown method: {value} (supported: GET, POST, PUT, PATCH, DELETE, verify)"
            )),
        }
    }
}

impl fmt::Display for ApiMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct CloudflareClient {
    client: Client,
    base_url: String,
}

impl CloudflareClient {
    pub fn new(base_url: String, timeout: Option<u64>) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(concat!("cloudflare-api-tools/", env!("CARGO_PKG_VERSION")));
        if let Some(seconds) = timeout {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        let client = builder.build().context("build http client")?;
        Ok(Self { client, base_url })
    }

    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            return base.to_string();
        }
        format!("{}/{}", base, path)
    }

    /// Sends a single request and returns the API envelope. Error statuses
    /// still produce an envelope; only transport failures and undecodable
    /// success bodies are errors. `body` is JSON text and goes out byte for byte.
    pub fn request(
        &self,
        method: ApiMethod,
        path: &str,
        auth: &Auth,
        body: Option<&str>,
    ) -> Result<Value> {
        if body.is_some() && !method.allows_body() {
            return Err(anyhow!("request body not supported for {method}"));
        }

        let url = self.build_url(path);
        let mut request = self
            .client
            .request(method.to_reqwest(), &url)
            .header(CONTENT_TYPE, "application/json");
        request = apply_auth(request, auth)?;
        if let Some(text) = body {
            request = request.body(text.to_string());
        }

        log::debug!("request {} {}", method, url);
        let resp = request
            .send()
            .with_context(|| format!("Connection error ({url})"))?;
        let status = resp.status();
        let text = resp.text().context("read response body")?;
        log::debug!("response {} ({} bytes)", status, text.len());
        decode_response(status, &text)
    }

    pub fn verify(&self, auth: &Auth) -> Result<Value> {
        self.request(ApiMethod::Get, VERIFY_PATH, auth, None)
    }
}

fn decode_response(status: StatusCode, text: &str) -> Result<Value> {
    if status.is_success() {
        if text.trim().is_empty() {
            return Ok(json!({ "success": true }));
        }
        return serde_json::from_str(text).context("decode json");
    }

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return Ok(value);
    }

    let reason = status.canonical_reason().unwrap_or("HTTP error");
    let snippet: String = text.chars().take(ERROR_BODY_LIMIT).collect();
    Ok(json!({
        "success": false,
        "errors": [{ "code": status.as_u16(), "message": format!("{reason}: {snippet}") }],
    }))
}

fn apply_auth(mut req: RequestBuilder, auth: &Auth) -> Result<RequestBuilder> {
    match auth {
        Auth::Token(token) => {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("invalid API token")?;
            req = req.header(AUTHORIZATION, value);
            Ok(req)
        }
        Auth::KeyEmail { key, email } => {
            let key = HeaderValue::from_str(key).context("invalid API key")?;
            let email = HeaderValue::from_str(email).context("invalid email")?;
            Ok(req.header("X-Auth-Key", key).header("X-Auth-Email", email))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn client_for(server: &mockito::ServerGuard) -> CloudflareClient {
        CloudflareClient::new(server.url(), Some(5)).unwrap()
    }

    #[test]
    fn resolve_prefers_token_over_key() {
        let auth = Auth::resolve(Some("tok"), Some("key"), Some("me@example.com")).unwrap();
        assert_eq!(auth, Auth::Token("tok".into()));
        assert_eq!(auth.describe(), "Using API Token authentication");
    }

    #[test]
    fn resolve_falls_back_to_key_and_email() {
        let auth = Auth::resolve(Some(""), Some("key"), Some("me@example.com")).unwrap();
        assert_eq!(
            auth,
            Auth::KeyEmail {
                key: "key".into(),
                email: "me@example.com".into()
            }
        );
        assert_eq!(auth.describe(), "Using API Key + Email authentication");
    }

    #[test]
    fn resolve_rejects_key_without_email() {
        let err = Auth::resolve(None, Some("key"), None).unwrap_err();
        assert!(
            err.to_string().contains("No authentication configured"),
            "got: {err}"
        );
    }

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("patch".parse::<ApiMethod>().unwrap(), ApiMethod::Patch);
        assert_eq!("Delete".parse::<ApiMethod>().unwrap(), ApiMethod::Delete);
        let err = "HEAD".parse::<ApiMethod>().unwrap_err();
        assert!(err.to_string().contains("Unknown method: HEAD"));
    }

    #[test]
    fn build_url_joins_relative_paths() {
        let client = CloudflareClient::new("https://api.example.com/v4/".into(), None).unwrap();
        assert_eq!(client.build_url("zones"), "https://api.example.com/v4/zones");
        assert_eq!(client.build_url("/zones"), "https://api.example.com/v4/zones");
        assert_eq!(
            client.build_url("/zones?name=example.com"),
            "https://api.example.com/v4/zones?name=example.com"
        );
        assert_eq!(
            client.build_url("https://other.example.com/x"),
            "https://other.example.com/x"
        );
        assert_eq!(client.build_url(""), "https://api.example.com/v4");
    }

    #[test]
    fn get_sends_bearer_token_and_query() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/zones")
            .match_query(Matcher::UrlEncoded("name".into(), "example.com".into()))
            .match_header("authorization", "Bearer test-token")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success":true,"result":[{"id":"z1"}]}"#)
            .create();

        let client = client_for(&server);
        let auth = Auth::Token("test-token".into());
        let value = client
            .request(ApiMethod::Get, "/zones?name=example.com", &auth, None)
            .unwrap();

        mock.assert();
        assert_eq!(value["result"][0]["id"], "z1");
    }

    #[test]
    fn post_sends_key_headers_and_json_body() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/zones")
            .match_header("x-auth-key", "global-key")
            .match_header("x-auth-email", "me@example.com")
            .match_body(r#"{"name":"example.com"}"#)
            .with_status(200)
            .with_body(r#"{"success":true,"result":{"id":"new-zone"}}"#)
            .create();

        let client = client_for(&server);
        let auth = Auth::KeyEmail {
            key: "global-key".into(),
            email: "me@example.com".into(),
        };
        let value = client
            .request(ApiMethod::Post, "zones", &auth, Some(r#"{"name":"example.com"}"#))
            .unwrap();

        mock.assert();
        assert_eq!(value["result"]["id"], "new-zone");
    }

    #[test]
    fn empty_success_body_becomes_success_envelope() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("DELETE", "/zones/z1")
            .with_status(204)
            .create();

        let client = client_for(&server);
        let auth = Auth::Token("t".into());
        let value = client
            .request(ApiMethod::Delete, "/zones/z1", &auth, None)
            .unwrap();

        mock.assert();
        assert_eq!(value, json!({ "success": true }));
    }

    #[test]
    fn json_error_body_is_returned_as_is() {
        let mut server = mockito::Server::new();
        let body = r#"{"success":false,"errors":[{"code":10000,"message":"Authentication error"}]}"#;
        let mock = server
            .mock("GET", "/user/tokens/verify")
            .with_status(403)
            .with_body(body)
            .create();

        let client = client_for(&server);
        let value = client.verify(&Auth::Token("bad".into())).unwrap();

        mock.assert();
        assert_eq!(value["success"], false);
        assert_eq!(value["errors"][0]["code"], 10000);
    }

    #[test]
    fn non_json_error_body_is_wrapped_and_truncated() {
        let mut server = mockito::Server::new();
        let page = "x".repeat(800);
        let mock = server
            .mock("GET", "/accounts")
            .with_status(502)
            .with_body(page)
            .create();

        let client = client_for(&server);
        let value = client
            .request(ApiMethod::Get, "/accounts", &Auth::Token("t".into()), None)
            .unwrap();

        mock.assert();
        assert_eq!(value["success"], false);
        assert_eq!(value["errors"][0]["code"], 502);
        let message = value["errors"][0]["message"].as_str().unwrap();
        assert!(message.starts_with("Bad Gateway: "), "got: {message}");
        assert_eq!(message.len(), "Bad Gateway: ".len() + ERROR_BODY_LIMIT);
    }

    #[test]
    fn get_with_body_is_rejected_before_sending() {
        let client = CloudflareClient::new("http://127.0.0.1:9".into(), Some(1)).unwrap();
        let err = client
            .request(ApiMethod::Get, "/zones", &Auth::Token("t".into()), Some("{}"))
            .unwrap_err();
        assert!(err.to_string().contains("request body not supported for GET"));
    }

    #[test]
    fn body_is_sent_verbatim() {
        let mut server = mockito::Server::new();
        let raw = r#"{"ttl":12345678901234567890123, "comment":"keep  spacing"}"#;
        let mock = server
            .mock("PUT", "/zones/z1/dns_records/r1")
            .match_body(raw)
            .with_status(200)
            .with_body(r#"{"success":true,"result":{"id":"r1"}}"#)
            .create();

        let client = client_for(&server);
        let value = client
            .request(
                ApiMethod::Put,
                "/zones/z1/dns_records/r1",
                &Auth::Token("t".into()),
                Some(raw),
            )
            .unwrap();

        mock.assert();
        assert_eq!(value["result"]["id"], "r1");
    }

    #[test]
    fn refused_connection_is_a_connection_error() {
        let client = CloudflareClient::new("http://127.0.0.1:9".into(), Some(2)).unwrap();
        let err = client
            .request(ApiMethod::Get, "/zones", &Auth::Token("t".into()), None)
            .unwrap_err();
        assert!(
            err.to_string().starts_with("Connection error"),
            "got: {err}"
        );
    }
}
