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

//! Integration test wiring the Node Monitor, Latency Oracle and a Selector
//! together, the way the REST façade does, rather than exercising each in
//! isolation.

use std::sync::Arc;
use steering::geo::GeoCoords;
use steering::latency_oracle::LatencyOracle;
use steering::node_monitor::NodeMonitor;
use steering::node_monitor::StaticNodeConfig;
use steering::selector::DUcbControls;
use steering::selector::DiscountedUcb;
use steering::selector::Selector;

fn two_node_monitor() -> Arc<NodeMonitor> {
    NodeMonitor::with_static_nodes(
        vec![
            StaticNodeConfig {
                name: "cache-1".to_string(),
                address: "10.0.0.1".to_string(),
                coords: Some(GeoCoords::new(-23.0, -47.0)),
            },
            StaticNodeConfig {
                name: "cache-2".to_string(),
                address: "10.0.0.2".to_string(),
                coords: Some(GeoCoords::new(-23.0, -47.0)),
            },
        ],
        2,
    )
}

#[tokio::test]
async fn test_d_ucb_reacts_to_a_real_oracle_driven_latency_shock() {
    let monitor = two_node_monitor();
    monitor.tick().await;
    let oracle = LatencyOracle::new(Some(Arc::clone(&monitor)), 1.0);
    let arms = vec!["cache-1".to_string(), "cache-2".to_string()];

    let mut selector = DiscountedUcb::new();
    selector.initialize(&arms);

    // Warm cache-1 up with several unshocked oracle ticks so the shock
    // detector is armed (needs >= 5 raw samples).
    for _ in 0..6 {
        oracle.tick().await;
        let latency = oracle.get_current_latency("cache-1").await;
        let shock = selector.check_latency_shock("cache-1", latency);
        selector.update_environmental_state(false, shock);
        selector.update("cache-1", latency);
    }
    assert_eq!(selector.current_gamma(), 0.995);

    // A sticky 10x event dwarfs cache-1's normal noise band, so the next
    // oracle-driven reading is unambiguously a shock.
    oracle.apply_event_modifier("cache-1", 10.0, 30.0).await;
    oracle.tick().await;
    let shocked_latency = oracle.get_current_latency("cache-1").await;
    let shock = selector.check_latency_shock("cache-1", shocked_latency);
    assert!(shock);
    selector.update_environmental_state(false, shock);
    assert_eq!(selector.current_gamma(), 0.60);
    selector.update("cache-1", shocked_latency);
}

#[tokio::test]
async fn test_selector_arms_track_a_vanishing_node_across_components() {
    let monitor = two_node_monitor();
    monitor.tick().await;
    let oracle = LatencyOracle::new(Some(Arc::clone(&monitor)), 1.0);
    oracle.tick().await;

    let mut selector = DiscountedUcb::new();
    let arms: Vec<String> = monitor.nodes().await.into_iter().map(|n| n.name).collect();
    selector.initialize(&arms);
    for arm in &arms {
        let latency = oracle.get_current_latency(arm).await;
        selector.update(arm, latency);
    }
    assert_eq!(selector.counts_snapshot().len(), 2);

    // cache-2 disappears from the deployment.
    let shrunk = NodeMonitor::with_static_nodes(
        vec![StaticNodeConfig {
            name: "cache-1".to_string(),
            address: "10.0.0.1".to_string(),
            coords: Some(GeoCoords::new(-23.0, -47.0)),
        }],
        2,
    );
    shrunk.tick().await;
    let remaining_arms: Vec<String> = shrunk.nodes().await.into_iter().map(|n| n.name).collect();
    let ranked = selector.select_arm(&remaining_arms).await;
    assert_eq!(ranked, vec!["cache-1".to_string()]);
    assert_eq!(selector.counts_snapshot().len(), 1);
}
