//! MathGen 9 · Grade-9 Math Exam Generator Backend
//!
//! - Axum HTTP + WebSocket API
//! - Gemini integration for exam generation and the tutoring chat
//! - Printable exam paper and Word export
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   GEMINI_API_KEY      : enables Gemini (API_KEY is accepted as a fallback)
//!   GEMINI_BASE_URL     : default "https://generativelanguage.googleapis.com/v1beta"
//!   GEMINI_MODEL        : default "gemini-2.5-flash"
//!   GEMINI_TIMEOUT_SECS : request timeout, default 120
//!   EXAM_CONFIG_PATH    : path to TOML config (prompts, paper header, optional curriculum)
//!   WORKSPACE_IDLE_SECS : evict workspaces idle this long, default 3600
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod catalog;
mod topics;
mod request;
mod questions;
mod render;
mod export;
mod chat;
mod model;
mod gemini;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::{idle_limit_from_env, spawn_idle_sweeper, AppState};

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (workspaces, catalog, prompts, Gemini client).
  let state = Arc::new(AppState::new());

  // Evict HTTP workspaces nobody has touched for a while.
  let max_idle = idle_limit_from_env();
  info!(target: "mathgen", idle_secs = max_idle.as_secs(), "Workspace idle sweep enabled");
  spawn_idle_sweeper(state.clone(), max_idle);

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "mathgen", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "mathgen", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "mathgen", "Shutdown signal received");
}
