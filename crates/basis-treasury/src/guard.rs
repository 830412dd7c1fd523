// crates/basis-treasury/src/guard.rs
//
// One-call-per-block guard for price-sensitive Treasury entry points.
//
// An actor (transaction origin or direct caller) may complete at most one
// guarded call per block. This stops an actor from chaining, say, a bond
// purchase and a redemption against the same oracle reading. The set of
// actors seen is cleared whenever a call arrives for a later block.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use basis_core::{Address, BasisError, CallContext};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneBlockGuard {
    block: u64,
    entered: BTreeSet<Address>,
}

impl OneBlockGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a guarded call by `ctx.origin` and `ctx.caller`.
    ///
    /// The entry is part of the Treasury state, so a call that fails later
    /// is rolled back together with its guard entry.
    ///
    /// # Errors
    /// Returns `BasisError::SameBlockReentry` if either actor already
    /// entered in this block.
    pub fn enter(&mut self, ctx: &CallContext) -> Result<(), BasisError> {
        if ctx.block_number != self.block {
            self.block = ctx.block_number;
            self.entered.clear();
        }
        for actor in [ctx.origin, ctx.caller] {
            if self.entered.contains(&actor) {
                return Err(BasisError::SameBlockReentry {
                    actor,
                    block: ctx.block_number,
                });
            }
        }
        self.entered.insert(ctx.origin);
        self.entered.insert(ctx.caller);
        Ok(())
    }

    /// Whether `actor` has already entered in `block`.
    pub fn has_entered(&self, actor: &Address, block: u64) -> bool {
        self.block == block && self.entered.contains(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_call_same_block_rejected() {
        let mut guard = OneBlockGuard::new();
        let alice = Address::from_label("alice");
        guard.enter(&CallContext::new(alice, 10, 100)).unwrap();
        let err = guard.enter(&CallContext::new(alice, 10, 100)).unwrap_err();
        assert_eq!(err, BasisError::SameBlockReentry { actor: alice, block: 10 });
    }

    #[test]
    fn test_next_block_clears() {
        let mut guard = OneBlockGuard::new();
        let alice = Address::from_label("alice");
        guard.enter(&CallContext::new(alice, 10, 100)).unwrap();
        guard.enter(&CallContext::new(alice, 11, 112)).unwrap();
        assert!(guard.has_entered(&alice, 11));
        assert!(!guard.has_entered(&alice, 10));
    }

    #[test]
    fn test_origin_is_tracked_through_intermediaries() {
        let mut guard = OneBlockGuard::new();
        let alice = Address::from_label("alice");
        let router = Address::from_label("router");
        guard.enter(&CallContext::new(alice, 5, 60)).unwrap();
        // Same origin routed through a contract is still the same actor.
        let routed = CallContext::new(alice, 5, 60).forward(router);
        assert!(guard.enter(&routed).is_err());
    }

    #[test]
    fn test_distinct_actors_share_a_block() {
        let mut guard = OneBlockGuard::new();
        guard
            .enter(&CallContext::new(Address::from_label("alice"), 7, 80))
            .unwrap();
        guard
            .enter(&CallContext::new(Address::from_label("bob"), 7, 80))
            .unwrap();
    }
}
