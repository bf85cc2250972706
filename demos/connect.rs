//! Connect to a server and print what it reported during startup
//!
//! ```bash
//! RUST_LOG=pgconn=debug cargo run --example connect -- "postgres://postgres@localhost/postgres"
//! ```
//!
//! The connection string may also come from `DATABASE_URL`.

use pgconn::ConnectionInfo;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pgconn=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let url = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .ok_or("usage: connect <postgres://...> (or set DATABASE_URL)")?;

    let config = ConnectionInfo::parse(&url)?.to_config()?;
    let session = pgconn::connect(config).await?;

    println!("connected to {}", session.config().network_address());
    println!("  backend pid:    {}", session.process_id());
    println!("  tls:            {}", session.is_tls());
    println!("  tx status:      {}", session.tx_status() as char);
    for name in [
        "server_version",
        "server_encoding",
        "client_encoding",
        "TimeZone",
        "application_name",
    ] {
        println!("  {:<15} {}", format!("{}:", name), session.parameter_status(name));
    }

    session.close().await?;
    Ok(())
}
