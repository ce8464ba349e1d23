use std::time::Duration;

/// Operator-wide configuration: a plain struct with a `Default` impl,
/// overridable via env vars rather than a config-file crate.
#[derive(Clone, Debug)]
pub struct Config {
    /// Field manager string used on every server-side apply / patch call.
    pub field_manager: &'static str,
    /// How often to requeue a DSE that is not yet fully ready (§4.3 step 8).
    pub readiness_requeue: Duration,
    /// Backoff applied by `error_policy` on a failed reconcile.
    pub error_requeue: Duration,
    /// Steady-state requeue once a DSE is fully ready, to catch drift that
    /// watches might miss.
    pub steady_state_requeue: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            field_manager: "kindling-operator",
            readiness_requeue: Duration::from_secs(5),
            error_requeue: Duration::from_secs(10),
            steady_state_requeue: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Overrides defaults from environment variables when present. Invalid
    /// values are ignored (fall back to the default) rather than failing
    /// startup.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(secs) = std::env::var("KINDLING_READINESS_REQUEUE_SECS") {
            if let Ok(n) = secs.parse::<u64>() {
                cfg.readiness_requeue = Duration::from_secs(n);
            }
        }
        if let Ok(secs) = std::env::var("KINDLING_ERROR_REQUEUE_SECS") {
            if let Ok(n) = secs.parse::<u64>() {
                cfg.error_requeue = Duration::from_secs(n);
            }
        }
        cfg
    }
}
