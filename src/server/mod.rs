//! HTTP control surface
//!
//! Start/stop toggling and progress polling for the batch job, guarded by a
//! bearer token plus a single-use freshness nonce so a forged cross-site
//! request cannot trigger a run.

pub mod handlers;
pub mod nonce;
pub mod state;

use actix_web::{dev::Server, web, App, HttpServer};
use anyhow::{anyhow, Result};
use tracing::info;

pub use nonce::NonceStore;
pub use state::AppState;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health))
        .route("/control/nonce", web::post().to(handlers::issue_nonce))
        .route("/control/toggle", web::post().to(handlers::toggle))
        .route("/control/status", web::post().to(handlers::status));
}

pub fn run_server(state: AppState, bind_addr: &str) -> Result<Server> {
    let data = web::Data::new(state);
    let server = HttpServer::new(move || App::new().app_data(data.clone()).configure(routes))
        .bind(bind_addr)
        .map_err(|e| anyhow!("Failed to bind control server to {}: {}", bind_addr, e))?
        .run();

    info!(%bind_addr, "control server listening");
    Ok(server)
}
