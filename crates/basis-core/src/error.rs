// crates/basis-core/src/error.rs
//
// Protocol-wide error type for the Basis Protocol, plus the explicit
// best-effort wrapper used where a failing collaborator must not abort the
// enclosing operation.

use thiserror::Error;

use crate::identity::Address;

/// Protocol-wide error types for the Basis Protocol.
///
/// Every variant aborts the whole call; the `Protocol` aggregate discards the
/// staged state when any entry point returns one of these.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BasisError {
    /// The component's start time has not been reached yet.
    #[error("Not started: {0}")]
    NotStarted(String),

    /// The Treasury has handed control to a successor.
    #[error("Treasury has been migrated")]
    Migrated,

    /// The Treasury has not been initialized yet.
    #[error("Treasury is not initialized")]
    NotInitialized,

    /// One-shot initialization was attempted twice.
    #[error("Already initialized: {0}")]
    AlreadyInitialized(String),

    /// The caller lacks the capability required by the entry point.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Zero or otherwise unusable amount.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Balance too low for a transfer, burn, or withdrawal.
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Allowance too low for a pull-based transfer or burn.
    #[error("Insufficient allowance: {0}")]
    InsufficientAllowance(String),

    /// The oracle price is outside the band required by the operation.
    #[error("Price not eligible: {0}")]
    PriceNotEligible(String),

    /// The caller's expected price differs from the oracle price.
    #[error("Cash price moved: expected {expected}, oracle reports {actual}")]
    PriceMoved { expected: String, actual: String },

    /// No accumulated debt is available to mint bonds against.
    #[error("No debt capacity: {0}")]
    NoDebtCapacity(String),

    /// The Treasury cannot cover a bond redemption.
    #[error("Insufficient budget: {0}")]
    InsufficientBudget(String),

    /// Staked funds or rewards are still inside their lockup window.
    #[error("Lockup: {0}")]
    Lockup(String),

    /// An epoch-gated action was attempted before the next epoch opened.
    #[error("Epoch not ready: current epoch {current}, next allowed epoch {next}")]
    EpochNotReady { current: u64, next: u64 },

    /// A second mutating call from the same actor inside one block.
    #[error("One call per block: {actor} already called at block {block}")]
    SameBlockReentry { actor: Address, block: u64 },

    /// Checked arithmetic failed (overflow, underflow, division by zero).
    #[error("Arithmetic error: {0}")]
    Arithmetic(String),

    /// Price source failure.
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Invalid configuration or governance parameter.
    #[error("Config error: {0}")]
    Config(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid state transition.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for BasisError {
    fn from(e: serde_json::Error) -> Self {
        BasisError::Serialization(e.to_string())
    }
}

/// Result of a call whose failure the caller deliberately tolerates.
///
/// Wrapping a `Result` in `BestEffort` forces the call site to decide what to
/// do with the error through [`BestEffort::ignore`] instead of silently
/// dropping it with `let _ =`.
#[must_use = "a best-effort result must be consumed with `ignore`"]
#[derive(Debug)]
pub struct BestEffort<T>(Result<T, BasisError>);

impl<T> BestEffort<T> {
    /// Discard the error, logging it, and return the value if the call succeeded.
    pub fn ignore(self, what: &str) -> Option<T> {
        match self.0 {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("{} failed and was skipped: {}", what, err);
                None
            }
        }
    }
}

impl<T> From<Result<T, BasisError>> for BestEffort<T> {
    fn from(result: Result<T, BasisError>) -> Self {
        BestEffort(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_effort_keeps_value() {
        let outcome: BestEffort<u32> = Ok(7).into();
        assert_eq!(outcome.ignore("lookup"), Some(7));
    }

    #[test]
    fn test_best_effort_discards_error() {
        let outcome: BestEffort<u32> = Err(BasisError::Oracle("down".to_string())).into();
        assert_eq!(outcome.ignore("lookup"), None);
    }

    #[test]
    fn test_error_display() {
        let err = BasisError::EpochNotReady { current: 3, next: 4 };
        assert_eq!(
            err.to_string(),
            "Epoch not ready: current epoch 3, next allowed epoch 4"
        );
    }
}
