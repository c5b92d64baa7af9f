use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use bookstore::email::SmtpMailer;
use bookstore::gateway::RazorpayGateway;
use bookstore::storage::MongoStorage;
use bookstore::web::{AppState, build_router};
use common::config::Config;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file
    #[arg(short, long, default_value = "config/config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    println!("Loading config from: {}", args.config);
    let config = Config::load(&args.config)
        .map_err(|err| anyhow!("loading config from {}: {}", args.config, err))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.backend.log_level)),
        )
        .init();

    let storage = Arc::new(
        MongoStorage::new(&config.common.database_url, &config.common.database_name)
            .await
            .map_err(|err| anyhow!("connecting to mongo: {}", err))?,
    );
    let gateway = Arc::new(
        RazorpayGateway::new(&config.razorpay)
            .map_err(|err| anyhow!("initializing payment gateway: {}", err))?,
    );
    let mailer = Arc::new(
        SmtpMailer::new(&config.email)
            .map_err(|err| anyhow!("initializing smtp mailer: {}", err))?,
    );

    let state = AppState {
        users: storage.clone(),
        books: storage.clone(),
        orders: storage.clone(),
        payments: storage,
        gateway,
        mailer,
        jwt_secret: config.backend.jwt_secret.clone(),
        token_ttl_minutes: config.backend.token_ttl_minutes,
        uploads_dir: config.backend.uploads_dir.clone(),
        frontend_url: config.email.frontend_url.clone(),
    };
    let app = build_router(state, &config.backend.cors_origin)
        .map_err(|err| anyhow!("building router: {}", err))?;

    tracing::info!("Starting backend service at {}", config.backend.server_address);
    let listener = tokio::net::TcpListener::bind(&config.backend.server_address)
        .await
        .context("binding server address")?;
    axum::serve(listener, app).await.context("serving")?;

    Ok(())
}
