//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn a validated configuration into transport credentials
//! - Apply reloaded configurations to the running server
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - A reload only changes the TLS policy and admin key live; everything
//!   else waits for a restart and is reported as such

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::config::{ConfigError, ServerConfig};
use crate::credentials::{CredentialsError, OptionalTlsCredentials, TlsCredentials};
use crate::net::listener::ListenerError;
use crate::policy::PolicySwitch;

/// Fatal errors while bringing the server up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("listener.tls must be configured")]
    MissingTls,
    #[error("credentials error: {0}")]
    Credentials(#[from] CredentialsError),
    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),
    #[error("admin API error: {0}")]
    Admin(#[source] std::io::Error),
    #[error("metrics exporter error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// Build the optional-TLS credentials the listener serves with.
///
/// `policy` stays shared with the caller so it can be flipped at runtime.
pub fn build_credentials(
    config: &ServerConfig,
    policy: PolicySwitch,
) -> Result<OptionalTlsCredentials, StartupError> {
    let tls = config.listener.tls.as_ref().ok_or(StartupError::MissingTls)?;
    let secure = TlsCredentials::server_from_pem_files(Path::new(&tls.cert_path), Path::new(&tls.key_path))?;

    tracing::info!(
        cert_path = %tls.cert_path,
        tls_required = policy.is_required(),
        "Optional TLS credentials ready"
    );

    Ok(OptionalTlsCredentials::with_policy(secure, policy)?)
}

/// Apply a reloaded configuration.
///
/// The TLS policy is applied only when the file's value changed, and takes
/// effect for the next connection. The admin key applies to the next admin
/// request. Returns `true` if some other setting changed and needs a restart.
pub fn apply_config_update(
    current: &ArcSwap<ServerConfig>,
    policy: &PolicySwitch,
    next: ServerConfig,
) -> bool {
    let previous = current.load_full();

    // An unchanged file value must not undo a flip made through the admin API.
    if previous.policy.tls_required != next.policy.tls_required {
        policy.set_required(next.policy.tls_required);
    }

    let restart_needed = previous.listener != next.listener
        || previous.timeouts != next.timeouts
        || previous.admin.enabled != next.admin.enabled
        || previous.admin.bind_address != next.admin.bind_address
        || previous.observability != next.observability;
    if restart_needed {
        tracing::warn!("Configuration changed beyond the TLS policy; restart to apply");
    }

    current.store(Arc::new(next));
    restart_needed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_flips_policy_live() {
        let current = ArcSwap::from_pointee(ServerConfig::default());
        let policy = PolicySwitch::new(false);

        let mut next = ServerConfig::default();
        next.policy.tls_required = true;

        assert!(!apply_config_update(&current, &policy, next));
        assert!(policy.is_required());
        assert!(current.load().policy.tls_required);
    }

    #[test]
    fn reload_reports_restart_only_settings() {
        let current = ArcSwap::from_pointee(ServerConfig::default());
        let policy = PolicySwitch::new(false);

        let mut next = ServerConfig::default();
        next.listener.max_connections = 1;

        assert!(apply_config_update(&current, &policy, next));
        assert!(!policy.is_required());
    }

    #[test]
    fn unrelated_reload_keeps_runtime_policy() {
        let current = ArcSwap::from_pointee(ServerConfig::default());
        let policy = PolicySwitch::new(false);
        policy.set_required(true);

        let mut next = ServerConfig::default();
        next.observability.log_level = "debug".into();

        assert!(apply_config_update(&current, &policy, next));
        assert!(policy.is_required());
    }

    #[test]
    fn credentials_require_tls_material() {
        let err = build_credentials(&ServerConfig::default(), PolicySwitch::default()).unwrap_err();
        assert!(matches!(err, StartupError::MissingTls));
    }
}
