use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Introspection CLI for site-guard", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show guard status and event log usage
    Status,
    /// Show lockout table figures
    Lockouts,
    /// Show rate limiter tiers and tracked clients
    Limiter,
    /// List recent security events
    Events {
        /// Look-back window in minutes
        #[arg(short, long, default_value_t = 60)]
        window_minutes: u64,
        /// Only events of this kind (rate_limit, admin_access, failed_auth, suspicious_activity)
        #[arg(long)]
        kind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .user_agent(concat!("guard-cli/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let base = cli.url.trim_end_matches('/');
    let request = match cli.command {
        Commands::Status => client.get(format!("{}/_guard/status", base)),
        Commands::Lockouts => client.get(format!("{}/_guard/lockouts", base)),
        Commands::Limiter => client.get(format!("{}/_guard/limiter", base)),
        Commands::Events {
            window_minutes,
            kind,
        } => {
            let mut query = vec![("window_minutes", window_minutes.to_string())];
            if let Some(kind) = kind {
                query.push(("kind", kind));
            }
            client.get(format!("{}/_guard/events", base)).query(&query)
        }
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: introspection API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
