//! Offline token issuance tool.
//!
//! Mints a token record and writes it directly into the shared store using
//! the same key scheme the gateway reads. The gateway itself never takes
//! this path.

use chrono::{Duration, SecondsFormat, Utc};
use clap::Parser;
use uuid::Uuid;

use turnstile::config::GatewayConfig;
use turnstile::store::{RedisTokenStore, TokenRecord, TokenStore};

#[derive(Parser, Debug)]
#[command(name = "tokengen", about = "Issue an API token into the shared store", version)]
struct Args {
    /// Path to the gateway configuration file (for the store connection)
    #[arg(short, long)]
    config: Option<String>,

    /// Requests admitted per one-minute window
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    rate_limit: u64,

    /// Token lifetime in seconds
    #[arg(long, default_value_t = 86_400)]
    ttl_secs: i64,

    /// Allowed route pattern; repeat for multiple patterns
    #[arg(long = "route", value_name = "PATTERN")]
    routes: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::default(),
    };
    let store = RedisTokenStore::connect(&config.redis).await?;

    let routes = if args.routes.is_empty() {
        vec![
            "/api/v1/users/*".to_string(),
            "/api/v1/products/*".to_string(),
        ]
    } else {
        args.routes
    };

    let api_key = Uuid::new_v4().to_string();
    let record = TokenRecord {
        api_key: api_key.clone(),
        rate_limit: args.rate_limit,
        expires_at: (Utc::now() + Duration::seconds(args.ttl_secs))
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        allowed_routes: routes,
    };

    store.store(&record).await?;

    println!("Token generated and stored:");
    println!("API Key: {}", api_key);
    println!("Rate limit: {}/min", record.rate_limit);
    println!("Expires at: {}", record.expires_at);
    println!("Allowed routes: {}", record.allowed_routes.join(", "));

    Ok(())
}
