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

//! Baseline strategy: a fixed, lexicographic arm ordering.

use super::Selector;
use async_trait::async_trait;
use std::any::Any;
use std::collections::BTreeMap;

/// No-steering selector. Always returns arms in lexicographic order, so the
/// ranking is stable across calls given a fixed arm set.
#[derive(Default)]
pub struct NoSteering {}

impl NoSteering {
    /// Return a new instance.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Selector for NoSteering {
    fn initialize(&mut self, _arms: &[String]) {}

    async fn select_arm(&mut self, arms: &[String]) -> Vec<String> {
        let mut ranked = arms.to_vec();
        ranked.sort();
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
    async fn test_ranking_is_lexicographic_and_stable() {
        let mut selector = NoSteering::new();
        let arms = vec!["c3".to_string(), "c1".to_string(), "c2".to_string()];
        assert_eq!(selector.select_arm(&arms).await, vec!["c1", "c2", "c3"]);
        assert_eq!(selector.select_arm(&arms).await, vec!["c1", "c2", "c3"]);
    }
}
