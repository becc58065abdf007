use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "log-cli")]
#[command(about = "Client for the interaction log API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080/api")]
    url: String,

    /// Origin header to send, for deployments that reject other origins
    #[arg(short, long)]
    origin: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// GET the endpoint description
    Probe,
    /// POST one log record
    Send {
        /// Event type, e.g. "click"
        #[arg(short = 't', long = "type")]
        event_type: String,

        /// Event data as a JSON object, e.g. '{"x":10,"y":20}'
        #[arg(short, long)]
        data: String,

        #[arg(short, long)]
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(origin) = &cli.origin {
        headers.insert("origin", HeaderValue::from_str(origin)?);
    }

    match cli.command {
        Commands::Probe => {
            let res = client.get(&cli.url).headers(headers).send().await?;
            print_response(res).await?;
        }
        Commands::Send {
            event_type,
            data,
            key,
        } => {
            let data: Value = serde_json::from_str(&data)?;
            headers.insert("x-api-key", HeaderValue::from_str(&key)?);
            let res = client
                .post(&cli.url)
                .headers(headers)
                .json(&json!({ "type": event_type, "data": data }))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if let Some(remaining) = res.headers().get("ratelimit-remaining") {
        eprintln!("RateLimit-Remaining: {}", remaining.to_str().unwrap_or("?"));
    }

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }

    if !status.is_success() {
        eprintln!("Error: API returned status {status}");
        std::process::exit(1);
    }
    Ok(())
}
