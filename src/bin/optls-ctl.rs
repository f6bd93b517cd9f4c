use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "optls-ctl")]
#[command(about = "Management CLI for the optional TLS server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "OPTLS_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show server status and active connections
    Status,
    /// Show the current TLS policy
    Policy,
    /// Refuse plaintext clients from now on
    Require,
    /// Accept plaintext clients again
    Relax,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = match cli.command {
        Commands::Status => {
            client.get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Policy => {
            client.get(format!("{}/admin/policy", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Require => set_policy(&client, &cli.url, headers, true).await?,
        Commands::Relax => set_policy(&client, &cli.url, headers, false).await?,
    };
    print_response(res).await
}

async fn set_policy(
    client: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
    tls_required: bool,
) -> Result<reqwest::Response, reqwest::Error> {
    client.put(format!("{url}/admin/policy"))
        .headers(headers)
        .json(&json!({ "tls_required": tls_required }))
        .send()
        .await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
