use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::AdminState;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub active_connections: u64,
    pub tls_required: bool,
    pub handshake_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyState {
    pub tls_required: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        active_connections: state.tracker.active_count(),
        tls_required: state.policy.is_required(),
        handshake_timeout_secs: state.config.load().timeouts.handshake_secs,
    })
}

pub async fn get_policy(State(state): State<AdminState>) -> Json<PolicyState> {
    Json(PolicyState {
        tls_required: state.policy.is_required(),
    })
}

/// Set the policy for connections that have not reached their decision point.
pub async fn put_policy(
    State(state): State<AdminState>,
    Json(requested): Json<PolicyState>,
) -> Json<PolicyState> {
    let previous = state.policy.set_required(requested.tls_required);
    tracing::info!(
        previous,
        tls_required = requested.tls_required,
        "TLS policy set via admin API"
    );
    Json(PolicyState {
        tls_required: state.policy.is_required(),
    })
}
