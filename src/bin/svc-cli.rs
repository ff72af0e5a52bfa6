use clap::{Parser, Subcommand};
use serde_json::Value;

use svc_pipeline::config::{CipherConfig, EncryptionConfig};
use svc_pipeline::http::{ApiResponse, ServiceClient, Transport};

#[derive(Parser)]
#[command(name = "svc-cli")]
#[command(about = "Call svc-pipeline endpoints, optionally encrypted", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Shared cipher key; enables encrypted requests when set
    #[arg(short, long, env = "SVC_AES_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// GET a path, with optional `name=value` query parameters
    Get {
        path: String,
        params: Vec<String>,
    },
    /// POST a JSON document
    Post { path: String, json: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let transport = match &cli.key {
        Some(key) => Transport::new(
            &CipherConfig {
                enabled: true,
                key: key.clone(),
            },
            &EncryptionConfig { enabled: true },
        ),
        None => Transport::plaintext(),
    };
    let client = ServiceClient::new(transport)?;

    let (status, res) = match cli.command {
        Commands::Get { path, params } => {
            let pairs = params
                .iter()
                .map(|p| p.split_once('=').ok_or_else(|| format!("expected name=value, got '{p}'")))
                .collect::<Result<Vec<_>, _>>()?;
            client
                .get_query::<Value>(&format!("{}{}", cli.url, path), &pairs)
                .await?
        }
        Commands::Post { path, json } => {
            let body: Value = serde_json::from_str(&json)?;
            client
                .post_json::<_, Value>(&format!("{}{}", cli.url, path), &body)
                .await?
        }
    };

    print_response(status, res)
}

fn print_response(
    status: reqwest::StatusCode,
    res: ApiResponse<Value>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !status.is_success() {
        eprintln!("Error: service returned status {} (code {})", status, res.code);
        eprintln!("Message: {}", res.msg);
        return Ok(());
    }

    println!("{}", serde_json::to_string_pretty(&res)?);
    Ok(())
}
