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

//! UCB1 strategy: upper-confidence-bound selection over reward-per-pull.

use super::Selector;
use super::reward_for_latency;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::any::Any;
use std::collections::BTreeMap;

/// Smoothing term inside the confidence-width logarithm.
const EPSILON_PRIME: f64 = 1e-5;

#[derive(Debug, Clone, Copy, Default)]
struct Arm {
    count: u64,
    sum_reward: f64,
}

/// UCB1 selector.
pub struct Ucb1 {
    arms: BTreeMap<String, Arm>,
    total_pulls: u64,
}

impl Ucb1 {
    /// Return a new instance.
    pub fn new() -> Self {
        Self {
            arms: BTreeMap::new(),
            total_pulls: 0,
        }
    }

    fn ucb(&self, name: &str) -> f64 {
        let arm = self.arms.get(name).copied().unwrap_or_default();
        if arm.count == 0 {
            return f64::INFINITY;
        }
        let mean = arm.sum_reward / arm.count as f64;
        let width =
            (2. * (self.total_pulls.max(1) as f64 + EPSILON_PRIME).ln() / arm.count as f64).sqrt();
        mean + width
    }
}

impl Default for Ucb1 {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Selector for Ucb1 {
    fn initialize(&mut self, arms: &[String]) {
        self.arms.retain(|name, _| arms.contains(name));
        for name in arms {
            self.arms.entry(name.clone()).or_default();
        }
    }

    async fn select_arm(&mut self, arms: &[String]) -> Vec<String> {
        self.initialize(arms);
        let unpulled: Vec<String> = arms
            .iter()
            .cloned()
            .filter(|name| self.arms.get(name).map(|a| a.count == 0).unwrap_or(true))
            .collect();
        if !unpulled.is_empty() {
            let mut unpulled = unpulled;
            let mut rng = rand::thread_rng();
            unpulled.shuffle(&mut rng);
            let (head, rest) = unpulled.split_first().expect("non-empty checked above");
            let mut tail: Vec<String> = rest.to_vec();
            let mut pulled: Vec<String> = arms
                .iter()
                .cloned()
                .filter(|name| !unpulled.contains(name))
                .collect();
            pulled.sort_by(|a, b| self.ucb(b).total_cmp(&self.ucb(a)));
            tail.extend(pulled);
            let mut result = vec![head.clone()];
            result.extend(tail);
            return result;
        }
        let mut ranked = arms.to_vec();
        ranked.sort_by(|a, b| self.ucb(b).total_cmp(&self.ucb(a)));
        ranked
    }

    fn update(&mut self, arm: &str, latency_ms: f64) {
        let reward = reward_for_latency(latency_ms);
        let entry = self.arms.entry(arm.to_string()).or_default();
        entry.sum_reward += reward;
        entry.count += 1;
        self.total_pulls += 1;
    }

    fn counts_snapshot(&self) -> BTreeMap<String, f64> {
        self.arms.iter().map(|(k, v)| (k.clone(), v.count as f64)).collect()
    }

    fn values_snapshot(&self) -> BTreeMap<String, f64> {
        self.arms.iter().map(|(k, v)| (k.clone(), v.sum_reward)).collect()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

mod test {
    use super::*;

    #[test]
    fn test_monotone_reward_matches_s2() {
        let mut selector = Ucb1::new();
        let arms = vec!["c1".to_string(), "c2".to_string()];
        selector.initialize(&arms);
        for (arm, latency) in [("c1", 50.), ("c2", 25.), ("c1", 50.), ("c2", 25.), ("c2", 25.)] {
            selector.update(arm, latency);
        }
        assert_eq!(selector.arms["c1"].count, 2);
        assert_eq!(selector.arms["c2"].count, 3);
        assert!((selector.arms["c1"].sum_reward - 40.).abs() < 1e-9);
        assert!((selector.arms["c2"].sum_reward - 120.).abs() < 1e-9);
        assert_eq!(selector.total_pulls, 5);
    }

    #[tokio::test]
    async fn test_select_arm_is_a_permutation() {
        let mut selector = Ucb1::new();
        let arms = vec!["c1".to_string(), "c2".to_string(), "c3".to_string()];
        let mut ranked = selector.select_arm(&arms).await;
        ranked.sort();
        let mut expected = arms.clone();
        expected.sort();
        assert_eq!(ranked, expected);
    }
}
