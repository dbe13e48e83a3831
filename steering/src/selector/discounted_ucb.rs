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

//! Discounted-UCB: UCB1 with exponentially discounted statistics, reacting to
//! client movement and per-arm latency shocks.

use super::DUcbControls;
use super::Selector;
use super::reward_for_latency;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::any::Any;
use std::collections::BTreeMap;

/// Discount applied when the client is stationary and no shock is active.
const GAMMA_STILL: f64 = 0.995;
/// Discount applied once the client has ever moved (and no shock is active).
const GAMMA_MOVE: f64 = 0.75;
/// Discount applied during shock recovery.
const GAMMA_SHOCK: f64 = 0.60;
/// How long a shock keeps `gamma` at [GAMMA_SHOCK] after it is last detected.
const SHOCK_RECOVERY_SECONDS: f64 = 7.0;
/// Multiplier applied to an arm's raw average to derive its shock threshold.
const SHOCK_FACTOR: f64 = 2.5;
/// Minimum raw samples before shock detection is armed for an arm.
const MIN_SAMPLES_BEFORE_SHOCK: u64 = 5;

#[derive(Debug, Clone, Copy, Default)]
struct Arm {
    disc_count: f64,
    disc_sum_reward: f64,
    raw_count: u64,
    raw_sum_latency: f64,
    actual_count: u64,
}

/// Discounted-UCB selector.
pub struct DiscountedUcb {
    arms: BTreeMap<String, Arm>,
    t: u64,
    gamma: f64,
    shock_until: f64,
    ever_moved: bool,
}

impl DiscountedUcb {
    /// Return a new instance.
    pub fn new() -> Self {
        Self {
            arms: BTreeMap::new(),
            t: 0,
            gamma: GAMMA_STILL,
            shock_until: 0.,
            ever_moved: false,
        }
    }

    fn exploration_coef(&self) -> f64 {
        if self.gamma == GAMMA_SHOCK { 1.5 } else { 2.0 }
    }

    fn ucb(&self, name: &str) -> f64 {
        let arm = self.arms.get(name).copied().unwrap_or_default();
        if arm.disc_count < 1e-5 {
            return f64::INFINITY;
        }
        let mean = arm.disc_sum_reward / arm.disc_count;
        let width = (self.exploration_coef() * (self.t as f64 + 1e-5).ln() / arm.disc_count).sqrt();
        mean + width
    }
}

impl Default for DiscountedUcb {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Selector for DiscountedUcb {
    fn initialize(&mut self, arms: &[String]) {
        self.arms.retain(|name, _| arms.contains(name));
        for name in arms {
            self.arms.entry(name.clone()).or_default();
        }
    }

    async fn select_arm(&mut self, arms: &[String]) -> Vec<String> {
        self.initialize(arms);
        let unsampled: Vec<String> = arms
            .iter()
            .cloned()
            .filter(|name| self.arms.get(name).map(|a| a.disc_count < 1e-5).unwrap_or(true))
            .collect();
        if !unsampled.is_empty() {
            let mut unsampled = unsampled;
            let mut rng = rand::thread_rng();
            unsampled.shuffle(&mut rng);
            let (head, rest) = unsampled.split_first().expect("non-empty checked above");
            let mut tail: Vec<String> = rest.to_vec();
            let mut sampled: Vec<String> = arms
                .iter()
                .cloned()
                .filter(|name| !unsampled.contains(name))
                .collect();
            sampled.shuffle(&mut rng);
            tail.extend(sampled);
            let mut result = vec![head.clone()];
            result.extend(tail);
            return result;
        }
        let mut ranked = arms.to_vec();
        ranked.sort_by(|a, b| self.ucb(b).total_cmp(&self.ucb(a)));
        ranked
    }

    fn update(&mut self, arm: &str, latency_ms: f64) {
        {
            let entry = self.arms.entry(arm.to_string()).or_default();
            entry.raw_count += 1;
            entry.raw_sum_latency += latency_ms;
            entry.actual_count += 1;
        }
        let reward = reward_for_latency(latency_ms);
        self.t += 1;
        for x in self.arms.values_mut() {
            x.disc_count *= self.gamma;
            x.disc_sum_reward *= self.gamma;
        }
        let entry = self.arms.entry(arm.to_string()).or_default();
        entry.disc_count += 1.;
        entry.disc_sum_reward += reward;
    }

    fn counts_snapshot(&self) -> BTreeMap<String, f64> {
        self.arms.iter().map(|(k, v)| (k.clone(), v.disc_count)).collect()
    }

    fn values_snapshot(&self) -> BTreeMap<String, f64> {
        self.arms
            .iter()
            .map(|(k, v)| {
                let value = if v.disc_count.abs() < 1e-9 {
                    0.
                } else {
                    v.disc_sum_reward / v.disc_count
                };
                (k.clone(), value)
            })
            .collect()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl DUcbControls for DiscountedUcb {
    fn check_latency_shock(&self, arm: &str, latency_ms: f64) -> bool {
        let Some(arm) = self.arms.get(arm) else {
            return false;
        };
        if arm.raw_count < MIN_SAMPLES_BEFORE_SHOCK {
            return false;
        }
        let avg = arm.raw_sum_latency / arm.raw_count as f64;
        let thresh = if avg < 10. { avg + 15. } else { avg * SHOCK_FACTOR };
        let thresh = thresh.max(avg * SHOCK_FACTOR);
        latency_ms > thresh
    }

    fn update_environmental_state(&mut self, is_moving: bool, shock_detected: bool) {
        if is_moving {
            self.ever_moved = true;
        }
        let now = crate::time::get_timestamp_seconds();
        if shock_detected {
            self.gamma = GAMMA_SHOCK;
            self.shock_until = now + SHOCK_RECOVERY_SECONDS;
        } else if now < self.shock_until {
            self.gamma = GAMMA_SHOCK;
        } else if self.ever_moved {
            self.gamma = GAMMA_MOVE;
        } else {
            self.gamma = GAMMA_STILL;
        }
    }

    fn actual_counts_snapshot(&self) -> BTreeMap<String, f64> {
        self.arms
            .iter()
            .map(|(k, v)| (k.clone(), v.actual_count as f64))
            .collect()
    }

    fn current_gamma(&self) -> f64 {
        self.gamma
    }
}

mod test {
    use super::*;

    #[test]
    fn test_update_increments_t_by_one_and_discounts_other_arms() {
        let mut selector = DiscountedUcb::new();
        let arms = vec!["c1".to_string(), "c2".to_string()];
        selector.initialize(&arms);
        selector.update("c1", 30.);
        selector.update("c2", 30.);
        let t_before = selector.t;
        let gamma = selector.gamma;
        let c1_before = selector.arms["c1"];
        selector.update("c2", 25.);
        assert_eq!(selector.t, t_before + 1);
        let c1_after = selector.arms["c1"];
        assert!((c1_after.disc_count - c1_before.disc_count * gamma).abs() < 1e-9);
        assert!((c1_after.disc_sum_reward - c1_before.disc_sum_reward * gamma).abs() < 1e-9);
    }

    #[test]
    fn test_shock_detection_requires_minimum_samples() {
        let mut selector = DiscountedUcb::new();
        let arms = vec!["c1".to_string()];
        selector.initialize(&arms);
        for _ in 0..4 {
            selector.update("c1", 30.);
        }
        assert!(!selector.check_latency_shock("c1", 200.));
        selector.update("c1", 30.);
        assert!(selector.check_latency_shock("c1", 200.));
    }

    #[test]
    fn test_shock_sets_gamma_shock_and_recovery_window() {
        let mut selector = DiscountedUcb::new();
        selector.update_environmental_state(false, true);
        assert_eq!(selector.gamma, GAMMA_SHOCK);
        assert!(selector.shock_until > crate::time::get_timestamp_seconds());
    }

    #[test]
    fn test_movement_without_shock_moves_gamma_to_move_value() {
        let mut selector = DiscountedUcb::new();
        selector.update_environmental_state(true, false);
        assert_eq!(selector.gamma, GAMMA_MOVE);
    }
}
