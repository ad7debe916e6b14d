//! Circuit breaker state - rolling counters, trips, period resets
//!
//! Counter semantics are house-perspective net loss: positive deltas mean
//! players collectively won. All period math is UTC; a period's counter
//! is always rolled to the current window before it is read or written,
//! so stale periods never leak into a new period's total.

use crate::config::RiskConfig;
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Rolling accounting period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    /// Test order: the first breached period determines the trip type
    pub const ALL: [Period; 3] = [Period::Daily, Period::Weekly, Period::Monthly];

    /// Start of the period window containing `now`.
    ///
    /// Daily: UTC midnight. Weekly: UTC Monday 00:00. Monthly: the 1st
    /// of the UTC month, 00:00.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let date = now.date_naive();
        let start = match self {
            Period::Daily => date,
            Period::Weekly => {
                let days_from_monday = date.weekday().num_days_from_monday();
                date - Duration::days(days_from_monday as i64)
            }
            Period::Monthly => date.with_day(1).unwrap_or(date), // day 1 always exists
        };
        start.and_time(NaiveTime::MIN).and_utc()
    }

    /// The breaker status a trip on this period produces
    pub fn tripped_status(&self) -> BreakerStatus {
        match self {
            Period::Daily => BreakerStatus::TrippedDaily,
            Period::Weekly => BreakerStatus::TrippedWeekly,
            Period::Monthly => BreakerStatus::TrippedMonthly,
        }
    }
}

/// Breaker state machine:
/// `active ⇄ tripped_daily|tripped_weekly|tripped_monthly ⇄ manually_disabled`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BreakerStatus {
    Active,
    TrippedDaily,
    TrippedWeekly,
    TrippedMonthly,
    ManuallyDisabled,
}

impl BreakerStatus {
    pub fn is_tripped(&self) -> bool {
        matches!(
            self,
            BreakerStatus::TrippedDaily | BreakerStatus::TrippedWeekly | BreakerStatus::TrippedMonthly
        )
    }
}

/// One trip of the breaker, kept forever in `trip_history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub period: Period,
    pub tripped_at: DateTime<Utc>,
    pub net_loss_at_trip: Decimal,
    pub limit_at_trip: Decimal,
    /// Stamped when the trip is cleared (boundary auto-reset or manual)
    pub reset_at: Option<DateTime<Utc>>,
}

/// One tenant's circuit breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreaker {
    pub tenant_id: String,
    pub config: RiskConfig,
    pub status: BreakerStatus,

    pub daily_net_loss: Decimal,
    pub weekly_net_loss: Decimal,
    pub monthly_net_loss: Decimal,

    pub last_daily_reset: DateTime<Utc>,
    pub last_weekly_reset: DateTime<Utc>,
    pub last_monthly_reset: DateTime<Utc>,

    pub trip_history: Vec<TripRecord>,
}

impl CircuitBreaker {
    pub fn new(tenant_id: impl Into<String>, config: RiskConfig, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id: tenant_id.into().to_uppercase(),
            status: BreakerStatus::Active,
            daily_net_loss: Decimal::ZERO,
            weekly_net_loss: Decimal::ZERO,
            monthly_net_loss: Decimal::ZERO,
            last_daily_reset: Period::Daily.window_start(now),
            last_weekly_reset: Period::Weekly.window_start(now),
            last_monthly_reset: Period::Monthly.window_start(now),
            trip_history: Vec::new(),
            config,
        }
    }

    pub fn counter(&self, period: Period) -> Decimal {
        match period {
            Period::Daily => self.daily_net_loss,
            Period::Weekly => self.weekly_net_loss,
            Period::Monthly => self.monthly_net_loss,
        }
    }

    fn counter_mut(&mut self, period: Period) -> &mut Decimal {
        match period {
            Period::Daily => &mut self.daily_net_loss,
            Period::Weekly => &mut self.weekly_net_loss,
            Period::Monthly => &mut self.monthly_net_loss,
        }
    }

    pub fn limit(&self, period: Period) -> Decimal {
        match period {
            Period::Daily => self.config.daily_net_loss_limit,
            Period::Weekly => self.config.weekly_net_loss_limit,
            Period::Monthly => self.config.monthly_net_loss_limit,
        }
    }

    fn last_reset(&self, period: Period) -> DateTime<Utc> {
        match period {
            Period::Daily => self.last_daily_reset,
            Period::Weekly => self.last_weekly_reset,
            Period::Monthly => self.last_monthly_reset,
        }
    }

    fn set_last_reset(&mut self, period: Period, at: DateTime<Utc>) {
        match period {
            Period::Daily => self.last_daily_reset = at,
            Period::Weekly => self.last_weekly_reset = at,
            Period::Monthly => self.last_monthly_reset = at,
        }
    }

    /// Lazily roll every period whose boundary has been crossed since its
    /// last reset. Runs before every counter read or write.
    pub fn roll_periods(&mut self, now: DateTime<Utc>) {
        for period in Period::ALL {
            let window_start = period.window_start(now);
            if self.last_reset(period) < window_start {
                *self.counter_mut(period) = Decimal::ZERO;
                self.set_last_reset(period, window_start);

                if self.status == period.tripped_status() && self.config.auto_reset {
                    self.close_open_trip(period, window_start);
                    self.status = BreakerStatus::Active;
                    tracing::info!(
                        tenant = %self.tenant_id,
                        %period,
                        "circuit breaker auto-reset at period boundary"
                    );
                }
            }
        }
    }

    /// Add a net-loss delta to all three counters, then test each limit
    /// in daily → weekly → monthly order. The first breach trips.
    ///
    /// While `manually_disabled`, counters accumulate but nothing trips.
    pub fn record(&mut self, delta: Decimal, now: DateTime<Utc>) -> Option<TripRecord> {
        self.roll_periods(now);

        for period in Period::ALL {
            let limit = self.limit(period);
            let previous = self.counter(period);
            let next = previous + delta;
            *self.counter_mut(period) = next;
            self.check_alerts(period, previous, next, limit);
        }

        if self.status != BreakerStatus::Active {
            return None;
        }

        for period in Period::ALL {
            if self.counter(period) >= self.limit(period) {
                return Some(self.trip(period, now));
            }
        }
        None
    }

    /// Re-test counters against limits (used after enable and replay)
    pub fn evaluate(&mut self, now: DateTime<Utc>) -> Option<TripRecord> {
        self.roll_periods(now);

        if self.status != BreakerStatus::Active {
            return None;
        }

        for period in Period::ALL {
            if self.counter(period) >= self.limit(period) {
                // Don't duplicate a trip record that is still open
                if self.open_trip_index(period).is_some() {
                    self.status = period.tripped_status();
                    return None;
                }
                return Some(self.trip(period, now));
            }
        }
        None
    }

    /// Feed a replayed delta into only the periods whose current window
    /// contains `at`. Entries from closed periods are dropped.
    pub fn replay_feed(&mut self, delta: Decimal, at: DateTime<Utc>, now: DateTime<Utc>) {
        self.roll_periods(now);
        for period in Period::ALL {
            if at >= period.window_start(now) {
                *self.counter_mut(period) += delta;
            }
        }
    }

    /// Operator reset: clear the period's counter, close its open trip,
    /// and re-open the breaker if it was tripped on that period.
    pub fn manual_reset(&mut self, period: Period, now: DateTime<Utc>) {
        self.roll_periods(now);
        *self.counter_mut(period) = Decimal::ZERO;
        self.close_open_trip(period, now);
        if self.status == period.tripped_status() {
            self.status = BreakerStatus::Active;
        }
        tracing::info!(tenant = %self.tenant_id, %period, "circuit breaker manually reset");
    }

    /// Administrative suspension: nothing is gated and nothing trips
    /// until `enable` is called; counters keep accumulating.
    pub fn disable(&mut self) {
        self.status = BreakerStatus::ManuallyDisabled;
        tracing::warn!(tenant = %self.tenant_id, "circuit breaker manually disabled");
    }

    /// End administrative suspension and re-test current counters
    pub fn enable(&mut self, now: DateTime<Utc>) -> Option<TripRecord> {
        self.status = BreakerStatus::Active;
        tracing::info!(tenant = %self.tenant_id, "circuit breaker re-enabled");
        self.evaluate(now)
    }

    fn trip(&mut self, period: Period, now: DateTime<Utc>) -> TripRecord {
        self.status = period.tripped_status();
        let record = TripRecord {
            period,
            tripped_at: now,
            net_loss_at_trip: self.counter(period),
            limit_at_trip: self.limit(period),
            reset_at: None,
        };
        self.trip_history.push(record.clone());
        tracing::warn!(
            tenant = %self.tenant_id,
            %period,
            net_loss = %record.net_loss_at_trip,
            limit = %record.limit_at_trip,
            "circuit breaker TRIPPED"
        );
        record
    }

    fn open_trip_index(&self, period: Period) -> Option<usize> {
        self.trip_history
            .iter()
            .rposition(|t| t.period == period && t.reset_at.is_none())
    }

    fn close_open_trip(&mut self, period: Period, at: DateTime<Utc>) {
        if let Some(index) = self.open_trip_index(period) {
            self.trip_history[index].reset_at = Some(at);
        }
    }

    fn check_alerts(&self, period: Period, previous: Decimal, next: Decimal, limit: Decimal) {
        if limit <= Decimal::ZERO {
            return;
        }
        let critical = limit * self.config.alert_thresholds.critical;
        let warning = limit * self.config.alert_thresholds.warning;

        if previous < critical && next >= critical && next < limit {
            tracing::error!(
                tenant = %self.tenant_id,
                %period,
                net_loss = %next,
                %limit,
                "net loss crossed CRITICAL alert threshold"
            );
        } else if previous < warning && next >= warning && next < critical {
            tracing::warn!(
                tenant = %self.tenant_id,
                %period,
                net_loss = %next,
                %limit,
                "net loss crossed warning alert threshold"
            );
        }
    }
}
