//! Risk engine errors

use crate::breaker::BreakerStatus;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RiskError {
    #[error("Circuit breaker for tenant {tenant} is {status}, operation blocked")]
    LimitTripped {
        tenant: String,
        status: BreakerStatus,
    },
}
