#[macro_use]
extern crate tracing;

use std::{process, sync::Arc};

use axum::extract::FromRef;
use axum_extra::middleware::option_layer;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use yansi::Paint;

mod api;
mod auth;
mod config;
mod error;
mod middleware;
mod trace;
mod util;

use auth::{CredentialStore, TokenManager};

pub use config::CONFIG;
pub use error::Error;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    launch_info();
    dotenv().ok();
    if let Err(err) = trace::init(&CONFIG.log) {
        eprintln!("{}", err.red().bold());
        process::exit(1);
    }

    let store = match CredentialStore::open(&CONFIG.db_file) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    };
    info!(
        path = %store.path().display(),
        users = store.len(),
        "credential store ready"
    );
    let tokens = TokenManager::with_token_size(
        CONFIG.auth.admin_token.clone(),
        store.clone(),
        CONFIG.auth.token_bytes,
    );
    let state = AppState::new(tokens.clone());

    let cors = if CONFIG.debug {
        Some(
            CorsLayer::new()
                .allow_headers(Any)
                .allow_methods(Any)
                .allow_origin(Any),
        )
    } else {
        None
    };
    let layer = ServiceBuilder::new()
        .layer(middleware::TraceLayer)
        .layer(option_layer(cors));
    let app = api::routes(&state).with_state(state).layer(layer);

    let listener = match TcpListener::bind(CONFIG.addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("failed to bind {}: {}", CONFIG.addr, err);
            process::exit(1);
        }
    };
    match listener.local_addr() {
        Ok(local_addr) => info!("listening on http://{}", local_addr),
        Err(err) => warn!("listening on unknown address: {}", err),
    }

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("server error: {}", err);
    }
    tokens.reset();
    info!("server stopped");
}

#[derive(FromRef, Clone)]
pub struct AppState {
    pub store: Arc<CredentialStore>,
    pub tokens: Arc<TokenManager>,
}

impl AppState {
    pub fn new(tokens: Arc<TokenManager>) -> Self {
        Self {
            store: tokens.store().clone(),
            tokens,
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn launch_info() {
    println!();
    println!(
        "=================== Starting ADI Auth {} ===================",
        env!("CARGO_PKG_VERSION")
    );
    println!();
}
