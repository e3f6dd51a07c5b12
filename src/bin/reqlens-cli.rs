use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "reqlens-cli")]
#[command(about = "Query request logs and reports from a reqlens server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dump every recorded request
    Logs,
    /// Errors by type and peak hour
    Errors,
    /// Response time distribution
    ResponseTimes,
    /// Calls per endpoint and method
    Usage,
    /// Server errors and critical messages
    CriticalEvents,
    /// Totals and mean response time
    Status,
}

impl Commands {
    fn path(&self) -> &'static str {
        match self {
            Commands::Logs => "/api/logs/all",
            Commands::Errors => "/api/logs/report/errors",
            Commands::ResponseTimes => "/api/logs/report/response-times",
            Commands::Usage => "/api/logs/report/usage",
            Commands::CriticalEvents => "/api/logs/report/critical-events",
            Commands::Status => "/api/logs/report/application-status",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let url = format!("{}{}", cli.url.trim_end_matches('/'), cli.command.path());
    let res = client.get(url).send().await?;
    print_response(res).await?;

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if status == reqwest::StatusCode::NO_CONTENT {
        println!("No requests recorded yet");
        return Ok(());
    }
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
