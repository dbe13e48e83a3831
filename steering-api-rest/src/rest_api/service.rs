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

//! Coordinator that composes the node monitor, latency oracle, selector and
//! structured logger behind the two request endpoints.

use crate::rest_api::dto::CoordsRequest;
use std::path::PathBuf;
use std::sync::Arc;
use steering::error::SteeringError;
use steering::error::SteeringErrorKind;
use steering::geo::GeoCoords;
use steering::geo::haversine_distance_km;
use steering::latency_oracle::LatencyOracle;
use steering::manifest::SteeringManifest;
use steering::manifest::build_manifest;
use steering::node_monitor::NodeMonitor;
use steering::selector::DiscountedUcb;
use steering::selector::Selector;
use steering::selector::build_selector;
use steering::steering_log::LogRecord;
use steering::steering_log::StructuredLogger;
use steering::time::get_timestamp_seconds;
use tokio::sync::Mutex;

/// Distance, in kilometers, beyond which consecutive client positions are
/// classified as movement.
const MOVEMENT_DISTANCE_THRESHOLD_KM: f64 = 0.05;
/// Minimum age, in seconds, the previous pose must have before movement is
/// re-evaluated.
const MOVEMENT_MIN_SAMPLE_AGE_SECONDS: f64 = 0.9;

/// Construction-time configuration for a [SteeringService].
pub struct SteeringServiceConfig {
    /// Name of the bandit strategy to run; see [build_selector].
    pub strategy_name: String,
    /// Epsilon-Greedy exploration rate; ignored by other strategies.
    pub epsilon: f64,
    /// Docker network the node monitor inspects for cache containers.
    pub network_name: String,
    /// Node monitor tick interval, in seconds.
    pub monitor_interval_seconds: u64,
    /// Latency oracle tick interval, in seconds (clamped to `>= 0.5`).
    pub oracle_interval_seconds: f64,
    /// Directory the structured log is written under.
    pub log_dir: PathBuf,
    /// Suffix appended to the log filename, before the numeric disambiguator.
    pub log_suffix: String,
}

/// The client's last-known pose, used for movement classification.
struct LastPose {
    lat: f64,
    lon: f64,
    timestamp: f64,
}

/** Coordinates the Node Monitor, Latency Oracle, Selector and Structured
Logger behind the steering front-end's two endpoints.

A single process-scoped instance is constructed at startup and shared
behind an [Arc] across request handlers.
*/
pub struct SteeringService {
    node_monitor: Arc<NodeMonitor>,
    oracle: Arc<LatencyOracle>,
    selector: Mutex<Box<dyn Selector>>,
    strategy_name: String,
    logger: StructuredLogger,
    last_decision: Mutex<Option<String>>,
    last_pose: Mutex<Option<LastPose>>,
}

impl SteeringService {
    /// Construct a new instance. Fails fast (per §7's "internal invariants"
    /// policy) if the selector factory rejects the strategy, or if the log
    /// file cannot be created.
    pub fn new(config: SteeringServiceConfig) -> Result<Arc<Self>, SteeringError> {
        let node_monitor = NodeMonitor::new(&config.network_name, config.monitor_interval_seconds);
        Self::new_with_node_monitor(config, node_monitor)
    }

    /// Construct a new instance backed by a caller-supplied node monitor,
    /// bypassing Docker discovery entirely.
    ///
    /// Intended for test harnesses that want a deterministic cache set (see
    /// [NodeMonitor::with_static_nodes]), per the "coordinate source should
    /// accept static configuration as an alternative for test harnesses"
    /// design note.
    pub fn new_with_node_monitor(
        config: SteeringServiceConfig,
        node_monitor: Arc<NodeMonitor>,
    ) -> Result<Arc<Self>, SteeringError> {
        let oracle = LatencyOracle::new(Some(Arc::clone(&node_monitor)), config.oracle_interval_seconds);
        let selector = build_selector(&config.strategy_name, config.epsilon, Some(Arc::clone(&oracle)))?;
        let logger = StructuredLogger::new(&config.log_dir, &config.strategy_name, &config.log_suffix)?;
        Ok(Arc::new(Self {
            node_monitor,
            oracle,
            selector: Mutex::new(selector),
            strategy_name: config.strategy_name,
            logger,
            last_decision: Mutex::new(None),
            last_pose: Mutex::new(None),
        }))
    }

    /// Start the background node-monitor and latency-oracle loops.
    pub async fn start(&self) {
        self.node_monitor.start().await;
        self.oracle.start().await;
    }

    /// Stop the background loops, with bounded wait.
    pub async fn stop(&self) {
        self.oracle.stop().await;
        self.node_monitor.stop().await;
    }

    /// Run a single latency-oracle tick without starting its background
    /// loop. Exposed for integration tests that need a settled oracle
    /// reading (e.g. after applying an event modifier) without racing a
    /// real timer.
    pub async fn oracle_tick_for_test(&self) {
        self.oracle.tick().await;
    }

    /// Current known cache names, resynced from the node monitor on every
    /// call.
    async fn current_arms(&self) -> Vec<String> {
        let mut arms: Vec<String> = self
            .node_monitor
            .nodes()
            .await
            .into_iter()
            .map(|n| n.name)
            .collect();
        arms.sort();
        arms
    }

    /// Resolve a steering decision for `reload_uri` and build its manifest.
    ///
    /// 503 [SteeringErrorKind::NotReady] if there are no known arms, or if
    /// the selector returns an empty ranking; `lastDecision` is left
    /// untouched in the latter case.
    pub async fn get_decision(&self, reload_uri: String) -> Result<SteeringManifest, SteeringError> {
        let arms = self.current_arms().await;
        if arms.is_empty() {
            return Err(SteeringErrorKind::NotReady.error_with_msg("no known cache nodes"));
        }
        let ranked = {
            let mut selector = self.selector.lock().await;
            selector.initialize(&arms);
            selector.select_arm(&arms).await
        };
        if ranked.is_empty() {
            return Err(SteeringErrorKind::NotReady.error_with_msg("selector returned no arms"));
        }
        *self.last_decision.lock().await = Some(ranked[0].clone());
        Ok(build_manifest(&ranked, reload_uri))
    }

    /// Apply a transient or sticky latency modifier to a named cache.
    pub async fn apply_latency_event(
        &self,
        server_name: &str,
        factor: f64,
        duration_seconds: f64,
    ) -> Result<(), SteeringError> {
        if !factor.is_finite() || factor <= 0. {
            return Err(SteeringErrorKind::Malformed.error_with_msg("factor must be a positive, finite number"));
        }
        self.oracle
            .apply_event_modifier(server_name, factor, duration_seconds)
            .await;
        Ok(())
    }

    /// Ingest one `/coords` report: update the client position, classify
    /// movement, feed the selector when latency feedback is present, and
    /// write one log row. Returns a short status word for the response body.
    pub async fn post_feedback(&self, body: CoordsRequest) -> Result<&'static str, SteeringError> {
        let has_location = body.lat.is_some() && body.long.is_some();
        let has_feedback = body.server_used.is_some() && body.rt.is_some();
        if !has_location && !has_feedback {
            return Err(SteeringErrorKind::Malformed.error_with_msg(
                "request must include a location (lat, long) or feedback (server_used, rt)",
            ));
        }

        let mut is_moving = false;
        if let (Some(lat), Some(lon)) = (body.lat, body.long) {
            self.oracle.update_client_location(lat, lon).await;
            is_moving = self.classify_movement(lat, lon).await;
        }

        let all_latencies = self.oracle.get_all_current_latencies().await;
        let mut record = LogRecord {
            timestamp_server: get_timestamp_seconds(),
            sim_time_client: body.time,
            client_lat: body.lat,
            client_lon: body.long,
            server_used_for_latency: None,
            experienced_latency_ms_client: None,
            experienced_latency_ms_oracle: None,
            experienced_latency_ms: None,
            all_servers_oracle_latency_json: serde_json::to_string(&all_latencies).ok(),
            steering_decision_main_server: self.last_decision.lock().await.clone(),
            rl_strategy: self.strategy_name.clone(),
            rl_counts_json: None,
            rl_actual_counts_json: None,
            rl_values_json: None,
            gamma_value: None,
        };

        if has_feedback {
            let server_used = body.server_used.expect("has_feedback checked above");
            let rt = body.rt.expect("has_feedback checked above");
            let arms = self.current_arms().await;
            if !arms.contains(&server_used) {
                return Err(SteeringErrorKind::Malformed
                    .error_with_msg(format!("server_used '{server_used}' is not a known cache")));
            }
            let oracle_latency = match all_latencies.get(&server_used) {
                Some(latency) => *latency,
                None => self.oracle.get_current_latency(&server_used).await,
            };

            {
                let mut selector = self.selector.lock().await;
                selector.initialize(&arms);
                if let Some(ducb) = selector.as_any_mut().downcast_mut::<DiscountedUcb>() {
                    let shock = ducb.check_latency_shock(&server_used, oracle_latency);
                    ducb.update_environmental_state(is_moving, shock);
                }
                selector.update(&server_used, oracle_latency);
                record.rl_counts_json = serde_json::to_string(&selector.counts_snapshot()).ok();
                record.rl_values_json = serde_json::to_string(&selector.values_snapshot()).ok();
                if let Some(ducb) = selector.as_any_mut().downcast_mut::<DiscountedUcb>() {
                    record.rl_actual_counts_json = serde_json::to_string(&ducb.actual_counts_snapshot()).ok();
                    record.gamma_value = Some(ducb.current_gamma());
                }
            }

            record.server_used_for_latency = Some(server_used);
            record.experienced_latency_ms_client = Some(rt);
            record.experienced_latency_ms_oracle = Some(oracle_latency);
            record.experienced_latency_ms = Some(oracle_latency);

            self.logger.log(&record)?;
            return Ok("logged");
        }

        self.logger.log(&record)?;
        Ok("updated")
    }

    /// Classify whether the client has moved since its last recorded pose,
    /// per §4.4's movement-detection rule. Updates the stored pose whenever
    /// enough time has passed to re-evaluate.
    async fn classify_movement(&self, lat: f64, lon: f64) -> bool {
        let now = get_timestamp_seconds();
        let mut last_pose = self.last_pose.lock().await;
        let Some(previous) = last_pose.as_ref() else {
            *last_pose = Some(LastPose {
                lat,
                lon,
                timestamp: now,
            });
            return false;
        };
        if now - previous.timestamp < MOVEMENT_MIN_SAMPLE_AGE_SECONDS {
            return false;
        }
        let distance_km = haversine_distance_km(
            &GeoCoords::new(previous.lat, previous.lon),
            &GeoCoords::new(lat, lon),
        );
        *last_pose = Some(LastPose {
            lat,
            lon,
            timestamp: now,
        });
        distance_km > MOVEMENT_DISTANCE_THRESHOLD_KM
    }
}

mod test {
    use super::*;

    fn config(strategy_name: &str, log_dir: PathBuf) -> SteeringServiceConfig {
        SteeringServiceConfig {
            strategy_name: strategy_name.to_string(),
            epsilon: 0.1,
            network_name: "test_network".to_string(),
            monitor_interval_seconds: 2,
            oracle_interval_seconds: 1.0,
            log_dir,
            log_suffix: String::new(),
        }
    }

    fn temp_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "steering_service_test_{label}_{}",
            steering::time::get_timestamp_micros()
        ))
    }

    #[tokio::test]
    async fn test_get_decision_is_not_ready_with_no_nodes() {
        let dir = temp_dir("not_ready");
        let service = SteeringService::new(config("random", dir.clone())).unwrap();
        let result = service.get_decision("https://host/path".to_string()).await;
        assert!(result.is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_post_feedback_rejects_unknown_server() {
        let dir = temp_dir("unknown_server");
        let service = SteeringService::new(config("random", dir.clone())).unwrap();
        let body = CoordsRequest {
            time: Some(1.0),
            lat: None,
            long: None,
            rt: Some(40.0),
            server_used: Some("ghost".to_string()),
        };
        let result = service.post_feedback(body).await;
        assert!(result.is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_post_feedback_rejects_empty_body() {
        let dir = temp_dir("empty_body");
        let service = SteeringService::new(config("random", dir.clone())).unwrap();
        let body = CoordsRequest {
            time: None,
            lat: None,
            long: None,
            rt: None,
            server_used: None,
        };
        assert!(service.post_feedback(body).await.is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
