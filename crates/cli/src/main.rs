//! tether command-line entry point.
//!
//! Sends one request through the client pipeline and prints the response
//! envelope as JSON on stdout. Logging goes to stderr so output stays
//! pipeable.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use tether_client::{Body, Client, Method, RequestOptions, ResponseEnvelope, Schema};
use tether_core::ClientConfig;

#[derive(Debug, Parser)]
#[command(name = "tether", version, about = "Send HTTP requests through the tether client pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL for relative targets (overrides TETHER_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Per-attempt timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Extra header, as `name: value` (repeatable)
    #[arg(short = 'H', long = "header", global = true)]
    headers: Vec<String>,

    /// Query parameter, as `name=value` (repeatable)
    #[arg(short = 'q', long = "query", global = true)]
    query: Vec<String>,

    /// Validate the response body against a JSON Schema document
    #[arg(long, global = true)]
    schema: Option<String>,

    /// Print only the response data
    #[arg(long, global = true)]
    data_only: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    Get { target: String },
    Head { target: String },
    Delete { target: String },
    Post(WithBody),
    Put(WithBody),
    Patch(WithBody),
}

#[derive(Debug, Args)]
struct WithBody {
    target: String,

    /// JSON request body
    #[arg(long)]
    json: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::load().context("loading configuration")?;
    if let Some(base_url) = &cli.base_url {
        config.base_url = Some(base_url.clone());
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.timeout_ms = timeout_ms;
    }

    let client = Client::new(config)?;
    let options = options(&cli)?;

    let options = match &cli.command {
        Command::Get { target } => options.method(Method::GET).url(target),
        Command::Head { target } => options.method(Method::HEAD).url(target),
        Command::Delete { target } => options.method(Method::DELETE).url(target),
        Command::Post(args) => with_body(options.method(Method::POST), args)?,
        Command::Put(args) => with_body(options.method(Method::PUT), args)?,
        Command::Patch(args) => with_body(options.method(Method::PATCH), args)?,
    };

    let response = client.request(options).await?;

    tracing::debug!("request {} completed with {}", response.config.request_id, response.status);

    let output = if cli.data_only { response.data.clone() } else { envelope_json(&response) };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

fn options(cli: &Cli) -> Result<RequestOptions> {
    let mut options = RequestOptions::new();

    for header in &cli.headers {
        let Some((name, value)) = header.split_once(':') else {
            bail!("invalid header '{}', expected `name: value`", header);
        };
        options = options.header(name.trim(), value.trim());
    }

    for pair in &cli.query {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("invalid query parameter '{}', expected `name=value`", pair);
        };
        options = options.query(name, value);
    }

    if let Some(timeout_ms) = cli.timeout_ms {
        options = options.timeout(Duration::from_millis(timeout_ms));
    }

    if let Some(raw) = &cli.schema {
        let document: Value = serde_json::from_str(raw).context("parsing --schema document")?;
        let schema = Schema::json_schema(document)?;
        options = options.validator(schema.kind()).validate(true).schema(schema);
    }

    Ok(options)
}

/// Attach the target and, when `--json` is given, a JSON body. Without it the
/// request is sent with no body and no content type.
fn with_body(options: RequestOptions, args: &WithBody) -> Result<RequestOptions> {
    let options = options.url(&args.target);
    match &args.json {
        Some(raw) => {
            let value: Value = serde_json::from_str(raw).context("parsing --json body")?;
            Ok(options.body(Body::Json(value)))
        }
        None => Ok(options),
    }
}

fn envelope_json(response: &ResponseEnvelope) -> Value {
    let headers: serde_json::Map<String, Value> = response
        .headers
        .iter()
        .map(|(name, value)| (name.to_string(), json!(value.to_str().unwrap_or_default())))
        .collect();

    json!({
        "request_id": response.config.request_id,
        "method": response.config.method.as_str(),
        "url": response.config.url.as_str(),
        "status": response.status.as_u16(),
        "status_text": response.status_text,
        "headers": headers,
        "data": response.data,
    })
}
