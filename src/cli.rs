use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use reqwest::Method;
use serde_json::Value;

use crate::http::{RequestBody, RequestOptions};

#[derive(Parser)]
#[command(name = "strict-fetch")]
#[command(about = "Typed HTTP endpoint client", long_about = None)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        help = "Path to the configuration file",
        default_value = "config/strict-fetch.toml"
    )]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one request and print the response envelope as JSON
    Request {
        #[arg(help = "Endpoint URL or path, may contain :name variables")]
        endpoint: String,
        #[arg(short = 'X', long, help = "HTTP method", default_value = "GET", value_parser = parse_method)]
        method: Method,
        #[arg(short = 'u', long, help = "Base URL, overrides the configured one")]
        base_url: Option<String>,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Call an endpoint of the configured repository by dotted name
    Call {
        #[arg(help = "Dotted endpoint name, e.g. vehicles.edit")]
        name: String,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Long-poll an endpoint, printing every response envelope
    Poll {
        #[arg(help = "Endpoint URL or path, may contain :name variables")]
        endpoint: String,
        #[arg(short = 'X', long, help = "HTTP method", default_value = "GET", value_parser = parse_method)]
        method: Method,
        #[arg(short = 'u', long, help = "Base URL, overrides the configured one")]
        base_url: Option<String>,
        #[arg(long, help = "Seconds a single poll request may take, fractions allowed")]
        timeout: Option<f64>,
        #[arg(long, help = "Consecutive timeouts after which polling stops")]
        max_timeouts: Option<u32>,
        #[arg(long, help = "Delay between poll requests in milliseconds")]
        delay: Option<u64>,
        #[arg(
            short = 'n',
            long,
            help = "Stop after this many responses",
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        count: Option<u64>,
        #[command(flatten)]
        request: RequestArgs,
    },
    /// List the endpoints of the configured repository
    Endpoints,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RequestArgs {
    #[arg(
        short,
        long = "query",
        help = "Query parameter as name=value. Can be specified multiple times.",
        value_parser = parse_query_pair
    )]
    pub query: Vec<(String, String)>,
    #[arg(
        short,
        long = "path",
        help = "Path variable as name=value. Can be specified multiple times.",
        value_parser = parse_query_pair
    )]
    pub path: Vec<(String, String)>,
    #[arg(
        short = 'H',
        long = "header",
        help = "Header as name:value. Can be specified multiple times.",
        value_parser = parse_header_pair
    )]
    pub headers: Vec<(String, String)>,
    #[arg(short, long, help = "Request body, sent as JSON when it parses as JSON and as text otherwise")]
    pub body: Option<String>,
    #[arg(long, help = "Fail instead of printing an envelope for failed requests")]
    pub throws: bool,
}

impl RequestArgs {
    pub fn to_options(&self) -> RequestOptions {
        let mut options = RequestOptions::new();
        for (name, value) in &self.query {
            options = options.query(name, value);
        }
        for (name, value) in &self.path {
            options = options.path(name, value);
        }
        for (name, value) in &self.headers {
            options = options.header(name, value);
        }
        if let Some(body) = &self.body {
            options = options.body(parse_body(body));
        }
        if self.throws {
            options = options.throws_on_error(true);
        }
        options
    }
}

fn parse_body(raw: &str) -> RequestBody {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => RequestBody::Json(value),
        Err(_) => RequestBody::Text(raw.to_string()),
    }
}

fn parse_method(raw: &str) -> Result<Method, String> {
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes()).map_err(|e| format!("Invalid method \"{raw}\": {e}"))
}

fn parse_query_pair(raw: &str) -> Result<(String, String), String> {
    split_pair(raw, '=')
}

fn parse_header_pair(raw: &str) -> Result<(String, String), String> {
    split_pair(raw, ':')
}

fn split_pair(raw: &str, separator: char) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(separator)
        .ok_or_else(|| format!("Expected name{separator}value, got \"{raw}\""))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Missing name in \"{raw}\""));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
