pub mod routes;

use crate::app::App;
use anyhow::{Context, Result};
use axum::Router;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::net::TcpListener;
use tracing::info;

pub async fn run_server(app: App) -> Result<()> {
    let port = app.config.api_port;
    let state = routes::ApiState { app };
    let router: Router = routes::router(state);

    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server: {addr}"))?;

    info!(address = %addr, "SalatReminder API server started");

    axum::serve(listener, router)
        .await
        .context("API server failed")?;

    Ok(())
}
