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

//! Simulated, slowly-evolving per-cache latency estimates.

use crate::geo::GeoCoords;
use crate::geo::haversine_distance_km;
use crate::node_monitor::NodeMonitor;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::Distribution;
use rand_distr::Normal;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Millisecond penalty applied per kilometer of client-to-cache distance.
/// Preserved exactly; do not round.
const MS_PER_KM: f64 = 0.0250;
/// Standard deviation of the per-tick noise, as a fraction of the effective
/// base latency.
const SIGMA_FACTOR: f64 = 0.15;
/// Floor below which a latency never falls, before an event modifier.
const MIN_LATENCY: f64 = 5.0;
/// Initial client position, used until the first `/coords` report arrives.
const INITIAL_CLIENT_POSE: (f64, f64) = (-23.0, -47.0);

/// The client's last known position.
#[derive(Debug, Clone, Copy)]
pub struct ClientPose {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Seconds since the Unix epoch when this pose was recorded.
    pub timestamp: f64,
}

/// A transient multiplier applied to a cache's latency.
#[derive(Debug, Clone, Copy)]
struct EventModifier {
    factor: f64,
    /// `0` means "sticky, never auto-clears".
    expires_at: f64,
}

impl EventModifier {
    const NONE: Self = Self {
        factor: 1.0,
        expires_at: 0.,
    };
}

/// Per-cache oracle state.
#[derive(Debug, Clone, Copy)]
pub struct OracleEntry {
    /// Configured or randomly assigned baseline latency.
    pub base_latency_ms: f64,
    /// Last computed latency, always `>= MIN_LATENCY * modifier.factor`.
    pub current_latency_ms: f64,
    modifier: EventModifier,
}

struct OracleState {
    entries: HashMap<String, OracleEntry>,
    client_pose: ClientPose,
    rng: StdRng,
}

/** Background simulator of per-cache latency.

Combines a per-cache base latency, a Haversine distance penalty to the
client, gaussian noise, and any injected event modifiers.
*/
pub struct LatencyOracle {
    node_monitor: Option<Arc<NodeMonitor>>,
    interval_seconds: f64,
    distance_penalty_enabled: bool,
    state: Mutex<OracleState>,
    running: Arc<AtomicBool>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl LatencyOracle {
    /// Return a new instance. `interval_seconds` is clamped to `>= 0.5`.
    pub fn new(node_monitor: Option<Arc<NodeMonitor>>, interval_seconds: f64) -> Arc<Self> {
        let interval_seconds = interval_seconds.max(0.5);
        Arc::new(Self {
            node_monitor,
            interval_seconds,
            distance_penalty_enabled: true,
            state: Mutex::new(OracleState {
                entries: HashMap::new(),
                client_pose: ClientPose {
                    lat: INITIAL_CLIENT_POSE.0,
                    lon: INITIAL_CLIENT_POSE.1,
                    timestamp: crate::time::get_timestamp_seconds(),
                },
                rng: StdRng::from_entropy(),
            }),
            running: Arc::new(AtomicBool::new(false)),
            join_handle: Mutex::new(None),
        })
    }

    /// Configured baseline latency for a known cache name, or `None` if it
    /// has no fixed baseline (caller should draw uniform[10,30]).
    fn fixed_base_latency(name: &str) -> Option<f64> {
        match name {
            "cache-1" => Some(30.),
            "cache-2" => Some(25.),
            "cache-3" => Some(125.),
            _ => None,
        }
    }

    /// Start the background tick loop.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let self_clone = Arc::clone(self);
        let handle = tokio::spawn(async move { self_clone.run_loop().await });
        self.join_handle.lock().await.replace(handle);
    }

    /// Stop the background tick loop, with bounded wait.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.join_handle.lock().await.take() {
            let timeout = std::time::Duration::from_secs_f64(self.interval_seconds + 1.);
            if tokio::time::timeout(timeout, handle).await.is_err() {
                log::warn!("Latency oracle loop did not stop within {timeout:?}.");
            }
        }
    }

    async fn run_loop(self: Arc<Self>) {
        while self.running.load(Ordering::SeqCst) {
            self.tick().await;
            self.sleep_sliced().await;
        }
    }

    async fn sleep_sliced(&self) {
        const SLICE: std::time::Duration = std::time::Duration::from_millis(100);
        let mut remaining = std::time::Duration::from_secs_f64(self.interval_seconds);
        while remaining > std::time::Duration::ZERO && self.running.load(Ordering::SeqCst) {
            let step = remaining.min(SLICE);
            tokio::time::sleep(step).await;
            remaining -= step;
        }
    }

    /// Update the client's last-known position. A no-op for `(NaN, NaN)` or
    /// when either coordinate fails to parse upstream; callers that cannot
    /// produce finite coordinates should simply not call this.
    pub async fn update_client_location(&self, lat: f64, lon: f64) {
        if !lat.is_finite() || !lon.is_finite() {
            return;
        }
        let mut state = self.state.lock().await;
        state.client_pose = ClientPose {
            lat,
            lon,
            timestamp: crate::time::get_timestamp_seconds(),
        };
    }

    /// Return the client's last known position.
    pub async fn client_pose(&self) -> ClientPose {
        self.state.lock().await.client_pose
    }

    /// Perform one oracle tick: resync the known cache set from the node
    /// monitor, refresh geo-coordinates, and recompute every cache's current
    /// latency.
    pub async fn tick(&self) {
        let Some(node_monitor) = &self.node_monitor else {
            return;
        };
        let nodes = node_monitor.nodes().await;
        if nodes.is_empty() {
            // Transient: keep previous state.
            return;
        }
        let coords = node_monitor.node_coordinates().await;
        let mut state = self.state.lock().await;
        let client_pose = state.client_pose;
        let known: Vec<String> = nodes.iter().map(|n| n.name.clone()).collect();

        let previous_keys: Vec<String> = state.entries.keys().cloned().collect();
        for name in previous_keys {
            if !known.contains(&name) {
                state.entries.remove(&name);
            }
        }
        for name in &known {
            if !state.entries.contains_key(name) {
                let base_latency_ms = Self::fixed_base_latency(name)
                    .unwrap_or_else(|| state.rng.gen_range(10.0..=30.0));
                state.entries.insert(
                    name.clone(),
                    OracleEntry {
                        base_latency_ms,
                        current_latency_ms: base_latency_ms,
                        modifier: EventModifier::NONE,
                    },
                );
            }
        }

        let now = crate::time::get_timestamp_seconds();
        for name in &known {
            let node_coords = coords.get(name).copied();
            let distance_km = match (self.distance_penalty_enabled, node_coords) {
                (true, Some(node_coords)) => haversine_distance_km(
                    &GeoCoords::new(client_pose.lat, client_pose.lon),
                    &node_coords,
                ),
                _ => 0.,
            };
            let entry = state.entries.get_mut(name).expect("just synced above");
            let effective_base = entry.base_latency_ms + distance_km * MS_PER_KM;

            let mut factor = entry.modifier.factor;
            if entry.modifier.expires_at != 0. && now >= entry.modifier.expires_at {
                entry.modifier = EventModifier::NONE;
                factor = 1.0;
            }

            let sigma = effective_base.max(1.0) * SIGMA_FACTOR;
            let noise = Normal::new(0., sigma)
                .map(|dist| dist.sample(&mut state.rng))
                .unwrap_or(0.);
            let pre = (effective_base + noise).max(MIN_LATENCY);
            let entry = state.entries.get_mut(name).expect("just synced above");
            entry.current_latency_ms = pre * factor;
        }
    }

    /// Return the current latency for a named cache. Attempts a one-shot
    /// resync with the node monitor if the cache is unknown; falls back to a
    /// random value in `[50,150]` (with a logged warning) if it is still
    /// unknown afterwards.
    pub async fn get_current_latency(&self, name: &str) -> f64 {
        {
            let state = self.state.lock().await;
            if let Some(entry) = state.entries.get(name) {
                return entry.current_latency_ms;
            }
        }
        self.tick().await;
        let mut state = self.state.lock().await;
        if let Some(entry) = state.entries.get(name) {
            return entry.current_latency_ms;
        }
        let fallback = state.rng.gen_range(50.0..=150.0);
        log::warn!("No oracle entry for '{name}'; returning a random fallback latency.");
        fallback
    }

    /// Return a snapshot of every cache's current latency.
    pub async fn get_all_current_latencies(&self) -> HashMap<String, f64> {
        self.state
            .lock()
            .await
            .entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.current_latency_ms))
            .collect()
    }

    /// Apply an event modifier to a named cache. `duration_seconds <= 0`
    /// produces a sticky modifier that never auto-clears. A no-op (with a
    /// logged warning) if `name` isn't already a known cache: the oracle's
    /// key set must track the node monitor's, not grow from arbitrary event
    /// reports.
    pub async fn apply_event_modifier(&self, name: &str, factor: f64, duration_seconds: f64) {
        let expires_at = if duration_seconds > 0. {
            crate::time::get_timestamp_seconds() + duration_seconds
        } else {
            0.
        };
        let mut state = self.state.lock().await;
        let Some(entry) = state.entries.get_mut(name) else {
            log::warn!("Ignoring latency event for unknown cache '{name}'.");
            return;
        };
        entry.modifier = EventModifier { factor, expires_at };
    }

    /// Return whether any cache currently has a non-default, unexpired event
    /// modifier.
    pub async fn is_any_event_active(&self) -> bool {
        let now = crate::time::get_timestamp_seconds();
        self.state.lock().await.entries.values().any(|entry| {
            entry.modifier.factor != 1.0
                && (entry.modifier.expires_at == 0. || entry.modifier.expires_at > now)
        })
    }
}

mod test {
    use super::*;
    use crate::node_monitor::StaticNodeConfig;

    async fn oracle_with_one_node() -> Arc<LatencyOracle> {
        let monitor = NodeMonitor::with_static_nodes(
            vec![StaticNodeConfig {
                name: "cache-1".to_string(),
                address: "10.0.0.1".to_string(),
                coords: Some(GeoCoords::new(-23.0, -47.0)),
            }],
            2,
        );
        monitor.tick().await;
        LatencyOracle::new(Some(monitor), 1.0)
    }

    #[tokio::test]
    async fn test_current_latency_never_below_floor() {
        let oracle = oracle_with_one_node().await;
        for _ in 0..20 {
            oracle.tick().await;
        }
        let latency = oracle.get_current_latency("cache-1").await;
        assert!(latency >= MIN_LATENCY);
    }

    #[tokio::test]
    async fn test_event_modifier_is_cleared_after_expiry() {
        let oracle = oracle_with_one_node().await;
        oracle.tick().await;
        oracle.apply_event_modifier("cache-1", 5.0, -1.).await;
        {
            let state = oracle.state.lock().await;
            assert_eq!(state.entries.get("cache-1").unwrap().modifier.expires_at, 0.);
        }
        oracle.apply_event_modifier("cache-1", 5.0, 0.001).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        oracle.tick().await;
        let state = oracle.state.lock().await;
        assert_eq!(state.entries.get("cache-1").unwrap().modifier.factor, 1.0);
    }

    #[tokio::test]
    async fn test_event_modifier_is_ignored_for_unknown_cache() {
        let oracle = oracle_with_one_node().await;
        oracle.tick().await;
        oracle.apply_event_modifier("ghost-cache", 5.0, -1.).await;
        let state = oracle.state.lock().await;
        assert!(!state.entries.contains_key("ghost-cache"));
        assert_eq!(state.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_interval_is_clamped() {
        let oracle = LatencyOracle::new(None, 0.1);
        assert!(oracle.interval_seconds >= 0.5);
    }
}
