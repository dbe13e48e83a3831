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

//! Epsilon-Greedy strategy: explore unvisited arms, else exploit the lowest
//! observed average latency with probability `1-epsilon`.

use super::Selector;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::any::Any;
use std::collections::BTreeMap;

/// Canonical default, per an open question in the source material: earlier
/// variants used 0.1 and 0.3, this fixes 0.1 as canonical while still
/// allowing it to be overridden at construction.
pub const DEFAULT_EPSILON: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
struct Arm {
    count: u64,
    /// `None` until the first sample, standing in for the "infinity" sentinel
    /// used for an arm's average before it has ever been pulled.
    avg_latency: Option<f64>,
}

impl Default for Arm {
    fn default() -> Self {
        Self {
            count: 0,
            avg_latency: None,
        }
    }
}

/// Epsilon-Greedy selector. Lower average latency is better; the stored
/// value is raw latency, not a reward (see the source's fixed ambiguity
/// around this sort direction).
pub struct EpsilonGreedy {
    epsilon: f64,
    arms: BTreeMap<String, Arm>,
}

impl EpsilonGreedy {
    /// Return a new instance with the given exploration rate.
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon,
            arms: BTreeMap::new(),
        }
    }
}

#[async_trait]
impl Selector for EpsilonGreedy {
    fn initialize(&mut self, arms: &[String]) {
        self.arms.retain(|name, _| arms.contains(name));
        for name in arms {
            self.arms.entry(name.clone()).or_default();
        }
    }

    async fn select_arm(&mut self, arms: &[String]) -> Vec<String> {
        self.initialize(arms);
        let mut rng = rand::thread_rng();
        let (unvisited, visited): (Vec<String>, Vec<String>) = arms
            .iter()
            .cloned()
            .partition(|name| self.arms.get(name).map(|a| a.count == 0).unwrap_or(true));

        if !unvisited.is_empty() {
            let mut unvisited = unvisited;
            unvisited.shuffle(&mut rng);
            let (head, rest) = unvisited.split_first().expect("non-empty checked above");
            let mut others: Vec<String> = rest.to_vec();
            others.extend(visited);
            if rng.gen_bool_exploit(self.epsilon) {
                others.shuffle(&mut rng);
            } else {
                others.sort_by(|a, b| self.avg_latency(a).total_cmp(&self.avg_latency(b)));
            }
            let mut result = vec![head.clone()];
            result.extend(others);
            return result;
        }

        let mut ranked = arms.to_vec();
        if rng.gen_bool_exploit(self.epsilon) {
            ranked.shuffle(&mut rng);
        } else {
            ranked.sort_by(|a, b| self.avg_latency(a).total_cmp(&self.avg_latency(b)));
        }
        ranked
    }

    fn update(&mut self, arm: &str, latency_ms: f64) {
        let entry = self.arms.entry(arm.to_string()).or_default();
        entry.count += 1;
        entry.avg_latency = Some(match entry.avg_latency {
            None => latency_ms,
            Some(avg) => {
                let n = entry.count as f64;
                ((n - 1.) * avg + latency_ms) / n
            }
        });
    }

    fn counts_snapshot(&self) -> BTreeMap<String, f64> {
        self.arms.iter().map(|(k, v)| (k.clone(), v.count as f64)).collect()
    }

    fn values_snapshot(&self) -> BTreeMap<String, f64> {
        self.arms
            .iter()
            .map(|(k, v)| (k.clone(), v.avg_latency.unwrap_or(f64::INFINITY)))
            .collect()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl EpsilonGreedy {
    fn avg_latency(&self, name: &str) -> f64 {
        self.arms
            .get(name)
            .and_then(|a| a.avg_latency)
            .unwrap_or(f64::INFINITY)
    }
}

/// Local extension so the explore/exploit coin flip reads the same way at
/// every call site. Returns `true` with probability `epsilon` (explore).
trait ExploreCoin {
    fn gen_bool_exploit(&mut self, epsilon: f64) -> bool;
}

impl<R: rand::Rng + ?Sized> ExploreCoin for R {
    fn gen_bool_exploit(&mut self, epsilon: f64) -> bool {
        self.gen_bool(epsilon.clamp(0., 1.))
    }
}

mod test {
    use super::*;

    fn arms() -> Vec<String> {
        vec!["c1".to_string(), "c2".to_string(), "c3".to_string()]
    }

    #[tokio::test]
    async fn test_cold_start_then_exploit_sorts_ascending_by_avg_latency() {
        let mut selector = EpsilonGreedy::new(0.0);
        let arms = arms();
        selector.initialize(&arms);
        selector.update("c1", 40.);
        selector.update("c2", 30.);
        selector.update("c3", 80.);
        let ranked = selector.select_arm(&arms).await;
        assert_eq!(ranked, vec!["c2", "c1", "c3"]);
    }

    #[tokio::test]
    async fn test_cold_start_sorts_unvisited_after_visited_when_not_head() {
        // c1 is visited with a high (bad) latency; c2 and c3 are unvisited.
        // Whichever unvisited arm isn't drawn as the head must land after
        // c1, not before it, matching a single sort over "every arm but the
        // head" rather than "unvisited first, then visited".
        let mut selector = EpsilonGreedy::new(0.0);
        let arms = arms();
        selector.initialize(&arms);
        selector.update("c1", 40.);
        for _ in 0..50 {
            let ranked = selector.select_arm(&arms).await;
            let head = &ranked[0];
            assert!(head == "c2" || head == "c3");
            let tail_other = ranked.iter().find(|name| *name != head && **name != "c1").unwrap();
            let head_pos = ranked.iter().position(|n| n == head).unwrap();
            let c1_pos = ranked.iter().position(|n| n == "c1").unwrap();
            let other_pos = ranked.iter().position(|n| n == tail_other).unwrap();
            assert_eq!(head_pos, 0);
            assert!(c1_pos < other_pos);
        }
    }

    #[test]
    fn test_update_computes_running_average() {
        let mut selector = EpsilonGreedy::new(0.0);
        selector.update("c1", 10.);
        selector.update("c1", 20.);
        selector.update("c1", 30.);
        assert_eq!(selector.arms["c1"].count, 3);
        assert!((selector.arms["c1"].avg_latency.unwrap() - 20.).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_select_arm_is_a_permutation_of_current_arms() {
        let mut selector = EpsilonGreedy::new(0.1);
        let arms = arms();
        let ranked = selector.select_arm(&arms).await;
        let mut sorted_ranked = ranked.clone();
        sorted_ranked.sort();
        let mut sorted_arms = arms.clone();
        sorted_arms.sort();
        assert_eq!(sorted_ranked, sorted_arms);
    }
}
