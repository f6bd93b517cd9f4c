//! Runtime TLS enforcement policy.
//!
//! # Responsibilities
//! - Answer "is TLS mandatory right now?" for each new connection
//! - Give the operator a handle to flip the answer without a restart
//!
//! # Design Decisions
//! - The credential stores an `Arc<dyn TlsPolicy>` and calls it once per
//!   connection, at the moment the handshake path is chosen
//! - Implementations must be safe to call from many handler tasks at once;
//!   connections past their decision point never observe a later toggle
//! - Any `Fn() -> bool + Send + Sync` closure is a policy

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

/// Decides whether plaintext connections are currently refused.
pub trait TlsPolicy: Send + Sync {
    /// `true` when every connection must negotiate TLS.
    fn tls_required(&self) -> bool;
}

impl<F> TlsPolicy for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn tls_required(&self) -> bool {
        self()
    }
}

/// Shared handle to a policy.
pub type SharedPolicy = Arc<dyn TlsPolicy>;

/// An operator-controlled flag backing a [`TlsPolicy`].
///
/// Clones share the same flag, so the admin API, the config watcher and the
/// credential can each hold one.
#[derive(Clone, Default)]
pub struct PolicySwitch {
    required: Arc<AtomicBool>,
}

impl PolicySwitch {
    pub fn new(tls_required: bool) -> Self {
        Self {
            required: Arc::new(AtomicBool::new(tls_required)),
        }
    }

    pub fn is_required(&self) -> bool {
        self.required.load(Ordering::Acquire)
    }

    /// Set the flag, returning the previous value.
    pub fn set_required(&self, tls_required: bool) -> bool {
        let previous = self.required.swap(tls_required, Ordering::AcqRel);
        if previous != tls_required {
            log_change(tls_required);
        }
        previous
    }

    /// Flip the flag, returning the new value.
    pub fn toggle(&self) -> bool {
        let now = !self.required.fetch_xor(true, Ordering::AcqRel);
        log_change(now);
        now
    }
}

fn log_change(tls_required: bool) {
    tracing::info!(tls_required, "TLS policy changed");
    metrics::record_policy_change(tls_required);
}

impl TlsPolicy for PolicySwitch {
    fn tls_required(&self) -> bool {
        self.is_required()
    }
}

impl fmt::Debug for PolicySwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicySwitch")
            .field("tls_required", &self.is_required())
            .finish()
    }
}
