/*
    Copyright 2025 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/

//! Bandit selection strategies.

mod discounted_ucb;
mod epsilon_greedy;
mod no_steering;
mod oracle_best;
mod random;
mod ucb1;

pub use discounted_ucb::DiscountedUcb;
pub use epsilon_greedy::DEFAULT_EPSILON;
pub use epsilon_greedy::EpsilonGreedy;
pub use no_steering::NoSteering;
pub use oracle_best::OracleBest;
pub use random::Random;
pub use ucb1::Ucb1;

use crate::error::SteeringError;
use crate::error::SteeringErrorKind;
use crate::latency_oracle::LatencyOracle;
use async_trait::async_trait;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// `reward = 1000/latencyMs` when `latencyMs > 0`, else `0`.
pub(crate) fn reward_for_latency(latency_ms: f64) -> f64 {
    if latency_ms > 0. { 1000. / latency_ms } else { 0. }
}

/** A pluggable multi-armed-bandit strategy over the current cache set.

Every public method first resyncs its internal arm set against the caller's
`arms` snapshot: state for surviving arms is preserved, new arms get default
state, vanished arms are dropped.
*/
#[async_trait]
pub trait Selector: Send {
    /// Resync internal state against the current arm set. Idempotent.
    fn initialize(&mut self, arms: &[String]);

    /// Return a ranked permutation of `arms`; position 0 is the chosen arm.
    ///
    /// Async because [OracleBest] must query the latency oracle, which is
    /// guarded by an async mutex; the other strategies simply don't await.
    async fn select_arm(&mut self, arms: &[String]) -> Vec<String>;

    /// Ingest one feedback sample for `arm`. A no-op for strategies without
    /// learning.
    fn update(&mut self, arm: &str, latency_ms: f64);

    /// Per-arm counters, for logging. Semantics vary per strategy.
    fn counts_snapshot(&self) -> BTreeMap<String, f64>;

    /// Per-arm values, for logging. Semantics vary per strategy.
    fn values_snapshot(&self) -> BTreeMap<String, f64>;

    /// Support downcasting to a concrete strategy to probe for the
    /// Discounted-UCB-only capability set.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/** Capability set implemented only by [DiscountedUcb].

The front-end downcasts a boxed [Selector] to probe for this trait rather
than branching on a strategy-name enum.
*/
pub trait DUcbControls: Send {
    /// Return whether `latency_ms` for `arm` constitutes a latency shock,
    /// given that arm's raw history. Does not mutate state.
    fn check_latency_shock(&self, arm: &str, latency_ms: f64) -> bool;

    /// Update the discount factor from environmental hints. Must be called
    /// before [Selector::update] for the same feedback.
    fn update_environmental_state(&mut self, is_moving: bool, shock_detected: bool);

    /// Per-arm actual pull counts (unlike [Selector::counts_snapshot], which
    /// returns the discounted count for this strategy).
    fn actual_counts_snapshot(&self) -> BTreeMap<String, f64>;

    /// The discount factor currently in effect.
    fn current_gamma(&self) -> f64;
}

/// Build a [Selector] for the named strategy.
///
/// `oracle` is required only for `oracle_best_choice`; construction fails
/// fast if it is missing, per the "internal invariants" policy for that
/// strategy.
pub fn build_selector(
    strategy_name: &str,
    epsilon: f64,
    oracle: Option<Arc<LatencyOracle>>,
) -> Result<Box<dyn Selector>, SteeringError> {
    match strategy_name {
        "epsilon_greedy" => Ok(Box::new(EpsilonGreedy::new(epsilon))),
        "ucb1" => Ok(Box::new(Ucb1::new())),
        "d_ucb" => Ok(Box::new(DiscountedUcb::new())),
        "random" => Ok(Box::new(Random::new())),
        "no_steering" => Ok(Box::new(NoSteering::new())),
        "oracle_best_choice" => {
            let oracle = oracle.ok_or_else(|| {
                SteeringErrorKind::Unspecified
                    .error_with_msg("oracle_best_choice requires a latency oracle")
            })?;
            Ok(Box::new(OracleBest::new(oracle)))
        }
        other => Err(SteeringErrorKind::Malformed.error_with_msg(format!("Unknown strategy '{other}'"))),
    }
}

mod test {
    use super::*;

    #[test]
    fn test_oracle_best_requires_an_oracle() {
        let result = build_selector("oracle_best_choice", 0.1, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let result = build_selector("not_a_real_strategy", 0.1, None);
        assert!(result.is_err());
    }
}
