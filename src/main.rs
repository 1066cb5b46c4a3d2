use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use community_feed::cache::SystemClock;
use community_feed::database::SqliteStore;
use community_feed::http::ReqwestClient;
use community_feed::settings::Settings;
use community_feed::{configure, AppState, Args};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("community_feed=info,actix_web=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let address = format!("{}:{}", args.ip, args.port);

    let store = SqliteStore::open(&args.db_path)
        .await
        .with_context(|| format!("failed to open database {}", args.db_path))?;
    Settings::install_defaults(&store)
        .await
        .context("failed to install default settings")?;

    let http = ReqwestClient::new(args.timeout_secs.map(Duration::from_secs))?;
    let app_state = web::Data::new(AppState::new(
        args,
        Arc::new(store.clone()),
        Arc::new(http),
        Arc::new(SystemClock),
    )?);

    info!("Server running at http://{}", address);
    let res = HttpServer::new(move || App::new().app_data(app_state.clone()).configure(configure))
        .bind(&address)?
        .run()
        .await;

    let _ = store.close().await;
    Ok(res?)
}
