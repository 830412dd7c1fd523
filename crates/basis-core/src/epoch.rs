// crates/basis-core/src/epoch.rs
//
// Epoch scheduler: the time-gating primitive shared by the Treasury and the
// TWAP oracle.
//
// An epoch is a fixed-length window measured from an absolute start time.
// A gated action may run at most once per epoch; the index is always derived
// from absolute time, so changing the period never rewrites the past.

use serde::{Deserialize, Serialize};

use crate::error::BasisError;

/// Fixed-period epoch clock with a record of the last gated execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epoch {
    /// Length of one epoch in seconds.
    period: u64,
    /// Absolute start time (seconds).
    start_time: u64,
    /// Timestamp of the last successful gated action. Equals `start_time`
    /// (plus any `start_epoch` offset) until the first execution.
    last_executed_at: u64,
}

impl Epoch {
    /// Create a new epoch clock.
    ///
    /// `start_epoch` skips that many epochs: the first gated action is allowed
    /// in epoch `start_epoch + 1` instead of epoch 0.
    ///
    /// # Errors
    /// Returns `BasisError::Config` if `period` is zero or the offset overflows.
    pub fn new(period: u64, start_time: u64, start_epoch: u64) -> Result<Self, BasisError> {
        if period == 0 {
            return Err(BasisError::Config("Epoch period must be non-zero".to_string()));
        }
        let last_executed_at = start_epoch
            .checked_mul(period)
            .and_then(|offset| start_time.checked_add(offset))
            .ok_or_else(|| BasisError::Config("Epoch start offset overflows".to_string()))?;
        Ok(Self {
            period,
            start_time,
            last_executed_at,
        })
    }

    /// Epoch index at `now`: `(max(now, start) - start) / period`.
    pub fn current_epoch(&self, now: u64) -> u64 {
        (now.max(self.start_time) - self.start_time) / self.period
    }

    /// Epoch index of the last gated execution.
    pub fn last_epoch(&self) -> u64 {
        (self.last_executed_at - self.start_time) / self.period
    }

    /// Earliest epoch in which the next gated action may run.
    pub fn next_epoch(&self) -> u64 {
        if self.last_executed_at == self.start_time {
            self.last_epoch()
        } else {
            self.last_epoch() + 1
        }
    }

    /// Absolute time at which `next_epoch` opens.
    pub fn next_epoch_point(&self) -> u64 {
        self.start_time
            .saturating_add(self.next_epoch().saturating_mul(self.period))
    }

    /// Require that the clock has started (`now > start_time`).
    pub fn check_start_time(&self, now: u64) -> Result<(), BasisError> {
        if now <= self.start_time {
            return Err(BasisError::NotStarted(format!(
                "now {} is not after start time {}",
                now, self.start_time
            )));
        }
        Ok(())
    }

    /// Require that a gated action may run at `now`.
    ///
    /// On success the caller performs the action and then calls
    /// [`Epoch::mark_executed`].
    pub fn check_epoch(&self, now: u64) -> Result<(), BasisError> {
        self.check_start_time(now)?;
        let current = self.current_epoch(now);
        let next = self.next_epoch();
        if current < next {
            return Err(BasisError::EpochNotReady { current, next });
        }
        Ok(())
    }

    /// Record a successful gated execution at `now`.
    pub fn mark_executed(&mut self, now: u64) {
        self.last_executed_at = now.max(self.start_time);
    }

    /// Change the epoch length. Governance only; the caller checks privileges.
    pub fn set_period(&mut self, period: u64) -> Result<(), BasisError> {
        if period == 0 {
            return Err(BasisError::Config("Epoch period must be non-zero".to_string()));
        }
        self.period = period;
        Ok(())
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn last_executed_at(&self) -> u64 {
        self.last_executed_at
    }
}
