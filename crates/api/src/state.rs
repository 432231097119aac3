use std::sync::Arc;

use kovanent_engine::VerificationEngine;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or is a pool handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: kovanent_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Verification session engine shared by the HR and candidate surfaces.
    pub engine: Arc<VerificationEngine>,
}
