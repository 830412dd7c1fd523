// crates/basis-treasury/src/events.rs
//
// Treasury event log.
//
// Every state change the Treasury makes is recorded as a `TreasuryEvent`
// alongside the block and timestamp it happened in. The log is part of the
// Treasury state, so events of a rolled-back call disappear with it.

use serde::{Deserialize, Serialize};

use basis_core::math::serde_units;
use basis_core::{Address, U256};

/// Something the Treasury did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreasuryEvent {
    Initialized {
        executor: Address,
    },
    Migration {
        target: Address,
    },
    BoughtBonds {
        account: Address,
        #[serde(with = "serde_units")]
        cash_burned: U256,
        #[serde(with = "serde_units")]
        bonds_minted: U256,
    },
    RedeemedBonds {
        account: Address,
        #[serde(with = "serde_units")]
        amount: U256,
    },
    TreasuryFunded {
        #[serde(with = "serde_units")]
        amount: U256,
    },
    DevelopmentFunded {
        #[serde(with = "serde_units")]
        amount: U256,
    },
    BoardroomFunded {
        boardroom: Address,
        #[serde(with = "serde_units")]
        amount: U256,
    },
    BondRewardFunded {
        #[serde(with = "serde_units")]
        amount: U256,
    },
    DebtAdded {
        #[serde(with = "serde_units")]
        amount: U256,
    },
    DebtCleared {
        #[serde(with = "serde_units")]
        amount: U256,
    },
}

/// A `TreasuryEvent` stamped with where it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub block_number: u64,
    pub timestamp: u64,
    #[serde(flatten)]
    pub event: TreasuryEvent,
}
