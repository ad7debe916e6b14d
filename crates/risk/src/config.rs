//! Risk configuration with configurable per-tenant limits
//!
//! All limits and flags can be overridden via config file or per-tenant
//! operator settings; defaults are conservative.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Configuration for one tenant's circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Rolling daily net-loss limit (house perspective)
    #[serde(default = "default_daily_limit")]
    pub daily_net_loss_limit: Decimal,

    /// Rolling weekly net-loss limit
    #[serde(default = "default_weekly_limit")]
    pub weekly_net_loss_limit: Decimal,

    /// Rolling monthly net-loss limit
    #[serde(default = "default_monthly_limit")]
    pub monthly_net_loss_limit: Decimal,

    /// Fractions of a limit at which alerts fire
    #[serde(default)]
    pub alert_thresholds: AlertThresholds,

    /// Re-open a tripped breaker automatically when its period rolls over
    #[serde(default = "default_auto_reset")]
    pub auto_reset: bool,

    /// What a trip blocks
    #[serde(default)]
    pub trip_actions: TripActions,
}

/// Alert thresholds as fractions of the corresponding limit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    #[serde(default = "default_warning_threshold")]
    pub warning: Decimal,

    #[serde(default = "default_critical_threshold")]
    pub critical: Decimal,
}

/// Which operation classes a tripped breaker blocks.
///
/// Payouts and settlements of already-placed bets are never blocked:
/// those liabilities are already incurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripActions {
    #[serde(default = "default_true")]
    pub block_new_bets: bool,

    #[serde(default)]
    pub block_deposits: bool,

    #[serde(default = "default_true")]
    pub notify: bool,
}

fn default_daily_limit() -> Decimal {
    Decimal::new(10_000, 0)
}

fn default_weekly_limit() -> Decimal {
    Decimal::new(50_000, 0)
}

fn default_monthly_limit() -> Decimal {
    Decimal::new(150_000, 0)
}

fn default_warning_threshold() -> Decimal {
    Decimal::new(80, 2) // 0.80
}

fn default_critical_threshold() -> Decimal {
    Decimal::new(95, 2) // 0.95
}

fn default_auto_reset() -> bool {
    true
}

fn default_true() -> bool {
    true
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            warning: default_warning_threshold(),
            critical: default_critical_threshold(),
        }
    }
}

impl Default for TripActions {
    fn default() -> Self {
        Self {
            block_new_bets: true,
            block_deposits: false,
            notify: true,
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            daily_net_loss_limit: default_daily_limit(),
            weekly_net_loss_limit: default_weekly_limit(),
            monthly_net_loss_limit: default_monthly_limit(),
            alert_thresholds: AlertThresholds::default(),
            auto_reset: default_auto_reset(),
            trip_actions: TripActions::default(),
        }
    }
}

impl RiskConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
