use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "lbmanager-cli")]
#[command(about = "Inspect a running HAProxy load balancer manager", long_about = None)]
struct Cli {
    /// Status endpoint of the manager
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show reconciler state
    Status,
    /// Exit non-zero unless the manager is listening for events
    Health,
    /// Print the last applied HAProxy configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{base}/status")).send().await?;
            print_json(res).await?;
        }
        Commands::Health => {
            let res = client.get(format!("{base}/healthz")).send().await?;
            let status = res.status();
            println!("{}", res.text().await?);
            if !status.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Config => {
            let res = client.get(format!("{base}/config")).send().await?;
            if res.status() == reqwest::StatusCode::NOT_FOUND {
                eprintln!("No configuration applied yet");
                std::process::exit(1);
            }
            print!("{}", res.error_for_status()?.text().await?);
        }
    }

    Ok(())
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: status endpoint returned {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
