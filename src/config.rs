//! Engine and platform settings.

use std::env;
use std::time::Duration;

use tracing::warn;

use crate::Amount;

/// Runtime settings for [`PayoutEngine`](crate::PayoutEngine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on waiting for a wallet lock before the operation fails.
    pub lock_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            lock_timeout: parse_var("PAYOUT_LOCK_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(default.lock_timeout),
        }
    }
}

/// Platform payout settings, resolved once per operation by the caller.
#[derive(Debug, Clone, Default)]
pub struct PayoutPolicy {
    pub min_payout_amount: Amount,
}

impl PayoutPolicy {
    pub fn new(min_payout_amount: Amount) -> Self {
        Self { min_payout_amount }
    }

    pub fn from_env() -> Self {
        Self {
            min_payout_amount: parse_var("PAYOUT_MIN_AMOUNT").unwrap_or_default(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}
