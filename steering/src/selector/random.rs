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

//! Baseline strategy: selects a uniform random permutation every call.

use super::Selector;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::any::Any;
use std::collections::BTreeMap;

/// Uniform-random selector. Has no learning and no per-arm state.
#[derive(Default)]
pub struct Random {}

impl Random {
    /// Return a new instance.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Selector for Random {
    fn initialize(&mut self, _arms: &[String]) {}

    async fn select_arm(&mut self, arms: &[String]) -> Vec<String> {
        let mut ranked = arms.to_vec();
        ranked.shuffle(&mut rand::thread_rng());
        ranked
    }

    fn update(&mut self, _arm: &str, _latency_ms: f64) {}

    fn counts_snapshot(&self) -> BTreeMap<String, f64> {
        BTreeMap::new()
    }

    fn values_snapshot(&self) -> BTreeMap<String, f64> {
        BTreeMap::new()
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

mod test {
    use super::*;

    #[tokio::test]
    async fn test_select_arm_is_a_permutation() {
        let mut selector = Random::new();
        let arms = vec!["c1".to_string(), "c2".to_string(), "c3".to_string()];
        let mut ranked = selector.select_arm(&arms).await;
        ranked.sort();
        let mut expected = arms.clone();
        expected.sort();
        assert_eq!(ranked, expected);
    }
}
