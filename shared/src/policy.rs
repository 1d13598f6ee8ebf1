//! Ride / turn permission chains
//!
//! Each chain is an ordered list of named predicates. The first predicate that denies
//! wins and the rest are not consulted.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::seat::SeatControls;

/// A rejected ride or turn attempt, shown to the rider as a localized error.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PermissionDenied {
    pub policy: String,
    pub code: String,
}

impl PermissionDenied {
    pub fn new(policy: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
            code: code.into(),
        }
    }

    pub fn lang_key(&self) -> String {
        format!("cantride-{}", self.code)
    }
}

/// What a predicate gets to look at.
#[derive(Clone, Copy, Debug)]
pub struct PolicyContext<'a> {
    pub seat_index: usize,
    pub seat_id: &'a str,
    pub rider: u64,
    pub controls: &'a SeatControls,
}

/// `Err(code)` denies.
type Predicate = Box<dyn Fn(&PolicyContext) -> Result<(), String> + Send + Sync>;

#[derive(Default)]
pub struct PolicyChain {
    policies: Vec<(String, Predicate)>,
}

impl PolicyChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        name: impl Into<String>,
        predicate: impl Fn(&PolicyContext) -> Result<(), String> + Send + Sync + 'static,
    ) -> &mut Self {
        self.policies.push((name.into(), Box::new(predicate)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn check(&self, ctx: &PolicyContext) -> Result<(), PermissionDenied> {
        for (name, predicate) in &self.policies {
            if let Err(code) = predicate(ctx) {
                return Err(PermissionDenied::new(name.clone(), code));
            }
        }
        Ok(())
    }
}

/// Permission chains consulted by the motion translator.
#[derive(Resource, Default)]
pub struct RidePolicies {
    pub can_ride: PolicyChain,
    pub can_turn: PolicyChain,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(controls: &SeatControls) -> PolicyContext<'_> {
        PolicyContext {
            seat_index: 0,
            seat_id: "rider-0",
            rider: 7,
            controls,
        }
    }

    #[test]
    fn test_first_failure_wins() {
        let mut chain = PolicyChain::new();
        chain
            .push("allow", |_| Ok(()))
            .push("saddle", |_| Err("nosaddle".to_string()))
            .push("never-reached", |_| panic!("chain should short-circuit"));

        let controls = SeatControls::default();
        let denied = chain.check(&ctx(&controls)).expect_err("saddle denies");
        assert_eq!(denied.policy, "saddle");
        assert_eq!(denied.lang_key(), "cantride-nosaddle");
    }

    #[test]
    fn test_empty_chain_allows() {
        let chain = PolicyChain::new();
        assert!(chain.is_empty());
        let controls = SeatControls::default();
        assert_eq!(chain.check(&ctx(&controls)), Ok(()));
    }
}
