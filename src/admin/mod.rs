//! Admin API for runtime operations.
//!
//! # Routes
//! - `GET /admin/status`: version, active connections, current policy
//! - `GET /admin/policy`: current TLS policy
//! - `PUT /admin/policy`: set the TLS policy for subsequent connections
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::net::connection::ConnectionTracker;
use crate::policy::PolicySwitch;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub policy: PolicySwitch,
    pub tracker: ConnectionTracker,
    pub config: Arc<ArcSwap<ServerConfig>>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/policy", get(get_policy).put(put_policy))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
