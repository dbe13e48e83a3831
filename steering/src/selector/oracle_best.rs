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

//! Oracle-Best strategy: always picks the cache the latency oracle currently
//! reports as fastest. Has no learning of its own; it is a ceiling to
//! compare the learning strategies against.

use super::Selector;
use crate::latency_oracle::LatencyOracle;
use async_trait::async_trait;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Oracle-Best selector. Construction fails (see [super::build_selector]) if
/// no oracle is supplied, since this strategy is meaningless without one.
pub struct OracleBest {
    oracle: Arc<LatencyOracle>,
}

impl OracleBest {
    /// Return a new instance backed by `oracle`.
    pub fn new(oracle: Arc<LatencyOracle>) -> Self {
        Self { oracle }
    }
}

#[async_trait]
impl Selector for OracleBest {
    fn initialize(&mut self, _arms: &[String]) {}

    async fn select_arm(&mut self, arms: &[String]) -> Vec<String> {
        let latencies = self.oracle.get_all_current_latencies().await;
        let mut ranked = arms.to_vec();
        ranked.sort_by(|a, b| {
            let latency_a = latencies.get(a).copied().unwrap_or(f64::INFINITY);
            let latency_b = latencies.get(b).copied().unwrap_or(f64::INFINITY);
            latency_a.total_cmp(&latency_b)
        });
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
    use crate::geo::GeoCoords;
    use crate::node_monitor::NodeMonitor;
    use crate::node_monitor::StaticNodeConfig;

    async fn oracle_with_three_nodes() -> Arc<LatencyOracle> {
        let monitor = NodeMonitor::with_static_nodes(
            vec![
                StaticNodeConfig {
                    name: "c1".to_string(),
                    address: "10.0.0.1".to_string(),
                    coords: Some(GeoCoords::new(-23.0, -47.0)),
                },
                StaticNodeConfig {
                    name: "c2".to_string(),
                    address: "10.0.0.2".to_string(),
                    coords: Some(GeoCoords::new(-23.0, -47.0)),
                },
                StaticNodeConfig {
                    name: "c3".to_string(),
                    address: "10.0.0.3".to_string(),
                    coords: Some(GeoCoords::new(-23.0, -47.0)),
                },
            ],
            2,
        );
        monitor.tick().await;
        let oracle = LatencyOracle::new(Some(monitor), 1.0);
        oracle.tick().await;
        oracle
    }

    #[tokio::test]
    async fn test_ranks_by_ascending_oracle_latency() {
        let oracle = oracle_with_three_nodes().await;
        oracle.apply_event_modifier("c1", 5.0, 10.).await;
        oracle.tick().await;
        let mut selector = OracleBest::new(Arc::clone(&oracle));
        let arms = vec!["c1".to_string(), "c2".to_string(), "c3".to_string()];
        let ranked = selector.select_arm(&arms).await;
        assert_eq!(ranked.last(), Some(&"c1".to_string()));
    }

    #[tokio::test]
    async fn test_missing_latency_is_ranked_last() {
        let oracle = oracle_with_three_nodes().await;
        let mut selector = OracleBest::new(Arc::clone(&oracle));
        let arms = vec![
            "c1".to_string(),
            "c2".to_string(),
            "c3".to_string(),
            "unknown".to_string(),
        ];
        let ranked = selector.select_arm(&arms).await;
        assert_eq!(ranked.last(), Some(&"unknown".to_string()));
    }
}
