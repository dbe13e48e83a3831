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

//! Discovers the set of running cache containers and their geo-coordinates.

use crate::geo::GeoCoords;
use bollard::Docker;
use bollard::container::ListContainersOptions;
use bollard::container::StatsOptions;
use futures::StreamExt;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use tokio::sync::Mutex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Number of samples retained per node.
const HISTORY_LEN: usize = 10;

/// A statically configured node, used as a Docker-free fallback for tests and
/// standalone deployments.
#[derive(Debug, Clone)]
pub struct StaticNodeConfig {
    /// Logical node name.
    pub name: String,
    /// Address clients should use to reach the node.
    pub address: String,
    /// Optional geo-coordinates.
    pub coords: Option<GeoCoords>,
}

/// A running cache node as last seen by the monitor.
#[derive(Debug, Clone)]
pub struct CacheNode {
    /// Logical node name.
    pub name: String,
    /// Address clients should use to reach the node.
    pub address: String,
}

/// One scan's worth of data about a node.
#[derive(Debug, Clone)]
pub struct NodeSample {
    /// CPU usage percentage at sample time.
    pub cpu_percent: f64,
    /// Memory usage percentage at sample time.
    pub mem_percent: f64,
    /// Cumulative received bytes.
    pub rx_bytes: u64,
    /// Cumulative transmitted bytes.
    pub tx_bytes: u64,
    /// Byte rate derived from the delta with the previous sample, in bytes/s.
    pub byte_rate: f64,
    /// Address at sample time.
    pub address: String,
    /// Geo-coordinates at sample time, if labeled.
    pub coords: Option<GeoCoords>,
    /// When this sample was taken.
    pub sampled_at: f64,
}

/** Periodically enumerates running cache containers.

Backed by a live [Docker] handle when one is available, or by a fixed list of
[StaticNodeConfig] for test harnesses and deployments outside a container
runtime.
*/
pub struct NodeMonitor {
    network_name: String,
    interval_seconds: u64,
    docker: Option<Docker>,
    static_nodes: Vec<StaticNodeConfig>,
    history: RwLock<HashMap<String, VecDeque<NodeSample>>>,
    running: Arc<AtomicBool>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl NodeMonitor {
    /// Return a new instance backed by the local Docker daemon, if reachable.
    ///
    /// Falls back to an empty, Docker-less instance (a no-op on [Self::start])
    /// when the daemon cannot be reached; this mirrors the "per-tick failures
    /// leave state unchanged" policy applied to the initial connection too.
    pub fn new(network_name: &str, interval_seconds: u64) -> Arc<Self> {
        let docker = Docker::connect_with_local_defaults()
            .inspect_err(|e| log::warn!("Failed to connect to the container runtime: {e}"))
            .ok();
        Arc::new(Self {
            network_name: network_name.to_string(),
            interval_seconds,
            docker,
            static_nodes: Vec::new(),
            history: RwLock::default(),
            running: Arc::new(AtomicBool::new(false)),
            join_handle: Mutex::new(None),
        })
    }

    /// Return a new instance backed by a fixed node list, bypassing Docker
    /// entirely. Intended for test harnesses.
    pub fn with_static_nodes(static_nodes: Vec<StaticNodeConfig>, interval_seconds: u64) -> Arc<Self> {
        Arc::new(Self {
            network_name: String::new(),
            interval_seconds,
            docker: None,
            static_nodes,
            history: RwLock::default(),
            running: Arc::new(AtomicBool::new(false)),
            join_handle: Mutex::new(None),
        })
    }

    /// Start the background discovery loop. Idempotent; a no-op (with a
    /// logged warning) when there is neither a live Docker handle nor a
    /// static node list.
    pub async fn start(self: &Arc<Self>) {
        if self.docker.is_none() && self.static_nodes.is_empty() {
            log::warn!("Node monitor has no container runtime handle and no static nodes; not starting.");
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let self_clone = Arc::clone(self);
        let handle = tokio::spawn(async move { self_clone.run_loop().await });
        self.join_handle.lock().await.replace(handle);
    }

    /// Stop the background discovery loop. Blocks until the loop has exited
    /// or a timeout of `interval + 1s` elapses.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.join_handle.lock().await.take() {
            let timeout = std::time::Duration::from_secs(self.interval_seconds + 1);
            if tokio::time::timeout(timeout, handle).await.is_err() {
                log::warn!("Node monitor loop did not stop within {timeout:?}.");
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
        let mut remaining = std::time::Duration::from_secs(self.interval_seconds);
        while remaining > std::time::Duration::ZERO && self.running.load(Ordering::SeqCst) {
            let step = remaining.min(SLICE);
            tokio::time::sleep(step).await;
            remaining -= step;
        }
    }

    async fn tick(&self) {
        let fresh = if let Some(docker) = &self.docker {
            Self::scan_docker(docker, &self.network_name).await
        } else {
            Self::scan_static(&self.static_nodes)
        };
        let Some(fresh) = fresh else {
            // Transient runtime failure: keep last-known state for this tick.
            return;
        };
        let mut history = self.history.write().await;
        let previous_names: Vec<String> = history.keys().cloned().collect();
        for name in previous_names {
            if !fresh.contains_key(&name) {
                history.remove(&name);
            }
        }
        for (name, mut sample) in fresh {
            let entry = history.entry(name).or_default();
            if let Some(previous) = entry.back() {
                let elapsed = sample.sampled_at - previous.sampled_at;
                if elapsed > 0. {
                    let delta_bytes = (sample.rx_bytes + sample.tx_bytes) as f64
                        - (previous.rx_bytes + previous.tx_bytes) as f64;
                    sample.byte_rate = (delta_bytes / elapsed).max(0.);
                }
            }
            entry.push_back(sample);
            while entry.len() > HISTORY_LEN {
                entry.pop_front();
            }
        }
    }

    fn scan_static(static_nodes: &[StaticNodeConfig]) -> Option<HashMap<String, NodeSample>> {
        let now = crate::time::get_timestamp_seconds();
        Some(
            static_nodes
                .iter()
                .map(|n| {
                    (
                        n.name.clone(),
                        NodeSample {
                            cpu_percent: 0.,
                            mem_percent: 0.,
                            rx_bytes: 0,
                            tx_bytes: 0,
                            byte_rate: 0.,
                            address: n.address.clone(),
                            coords: n.coords,
                            sampled_at: now,
                        },
                    )
                })
                .collect(),
        )
    }

    async fn scan_docker(docker: &Docker, network_name: &str) -> Option<HashMap<String, NodeSample>> {
        let mut filters = HashMap::new();
        filters.insert("network".to_string(), vec![network_name.to_string()]);
        let containers = docker
            .list_containers(Some(ListContainersOptions {
                all: false,
                filters,
                ..Default::default()
            }))
            .await
            .inspect_err(|e| log::warn!("Listing containers on '{network_name}' failed: {e}"))
            .ok()?;
        let mut fresh = HashMap::with_capacity(containers.len());
        let now = crate::time::get_timestamp_seconds();
        for container in containers {
            let Some(id) = container.id.clone() else {
                continue;
            };
            let name = container
                .names
                .as_ref()
                .and_then(|names| names.first())
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_else(|| id.clone());
            let Some(address) = Self::resolve_address(&container, network_name) else {
                log::debug!("Container '{name}' has no address on '{network_name}'; skipping.");
                continue;
            };
            let coords = Self::resolve_coords(docker, &id).await;
            let (cpu_percent, mem_percent, rx_bytes, tx_bytes) =
                Self::resolve_stats(docker, &id).await.unwrap_or((0., 0., 0, 0));
            fresh.insert(
                name,
                NodeSample {
                    cpu_percent,
                    mem_percent,
                    rx_bytes,
                    tx_bytes,
                    byte_rate: 0.,
                    address,
                    coords,
                    sampled_at: now,
                },
            );
        }
        Some(fresh)
    }

    fn resolve_address(
        container: &bollard::secret::ContainerSummary,
        network_name: &str,
    ) -> Option<String> {
        let networks = container.network_settings.as_ref()?.networks.as_ref()?;
        networks
            .get(network_name)
            .or_else(|| networks.values().next())
            .and_then(|endpoint| endpoint.ip_address.clone())
            .filter(|ip| !ip.is_empty())
    }

    async fn resolve_coords(docker: &Docker, container_id: &str) -> Option<GeoCoords> {
        let inspect = docker
            .inspect_container(container_id, None)
            .await
            .inspect_err(|e| log::debug!("Inspecting '{container_id}' failed: {e}"))
            .ok()?;
        let env = inspect.config?.env?;
        let mut lat = None;
        let mut lon = None;
        for entry in env {
            if let Some(value) = entry.strip_prefix("LATITUDE=") {
                lat = value.parse::<f64>().ok();
            } else if let Some(value) = entry.strip_prefix("LONGITUDE=") {
                lon = value.parse::<f64>().ok();
            }
        }
        match (lat, lon) {
            (Some(lat), Some(lon)) => Some(GeoCoords::new(lat, lon)),
            _ => None,
        }
    }

    async fn resolve_stats(docker: &Docker, container_id: &str) -> Option<(f64, f64, u64, u64)> {
        let mut stream = docker.stats(
            container_id,
            Some(StatsOptions {
                stream: false,
                one_shot: true,
            }),
        );
        let stats = stream
            .next()
            .await?
            .inspect_err(|e| log::debug!("Reading stats for '{container_id}' failed: {e}"))
            .ok()?;
        let cpu_delta = (stats.cpu_stats.cpu_usage.total_usage as f64)
            - (stats.precpu_stats.cpu_usage.total_usage as f64);
        let system_delta = (stats.cpu_stats.system_cpu_usage.unwrap_or(0) as f64)
            - (stats.precpu_stats.system_cpu_usage.unwrap_or(0) as f64);
        let online_cpus = stats.cpu_stats.online_cpus.unwrap_or(1).max(1) as f64;
        let cpu_percent = if system_delta > 0. && cpu_delta > 0. {
            (cpu_delta / system_delta) * online_cpus * 100.
        } else {
            0.
        };
        let mem_usage = stats.memory_stats.usage.unwrap_or(0) as f64;
        let mem_limit = stats.memory_stats.limit.unwrap_or(0) as f64;
        let mem_percent = if mem_limit > 0. { (mem_usage / mem_limit) * 100. } else { 0. };
        let (rx_bytes, tx_bytes) = stats
            .networks
            .as_ref()
            .map(|networks| {
                networks.values().fold((0u64, 0u64), |acc, n| {
                    (acc.0 + n.rx_bytes, acc.1 + n.tx_bytes)
                })
            })
            .unwrap_or((0, 0));
        Some((cpu_percent, mem_percent, rx_bytes, tx_bytes))
    }

    /// Return the current `(name, address)` snapshot. Only nodes with a
    /// resolved address are returned (the scan step already filters those
    /// out, so this is effectively everything currently tracked).
    pub async fn nodes(&self) -> Vec<CacheNode> {
        self.history
            .read()
            .await
            .iter()
            .filter_map(|(name, samples)| {
                samples.back().map(|s| CacheNode {
                    name: name.clone(),
                    address: s.address.clone(),
                })
            })
            .collect()
    }

    /// Return the current `name -> coords` snapshot. Only nodes with a
    /// resolved geo label are included.
    pub async fn node_coordinates(&self) -> HashMap<String, GeoCoords> {
        self.history
            .read()
            .await
            .iter()
            .filter_map(|(name, samples)| {
                samples
                    .back()
                    .and_then(|s| s.coords)
                    .map(|coords| (name.clone(), coords))
            })
            .collect()
    }

    /// Return a single field of the last sample for a node, if any.
    pub async fn node_data(&self, name: &str, key: &str) -> Option<String> {
        let history = self.history.read().await;
        let sample = history.get(name)?.back()?;
        Some(match key {
            "cpu_percent" => sample.cpu_percent.to_string(),
            "mem_percent" => sample.mem_percent.to_string(),
            "rx_bytes" => sample.rx_bytes.to_string(),
            "tx_bytes" => sample.tx_bytes.to_string(),
            "byte_rate" => sample.byte_rate.to_string(),
            "address" => sample.address.clone(),
            _ => return None,
        })
    }
}

mod test {
    use super::*;

    #[tokio::test]
    async fn test_static_nodes_are_visible_immediately_after_a_tick() {
        let monitor = NodeMonitor::with_static_nodes(
            vec![StaticNodeConfig {
                name: "cache-1".to_string(),
                address: "10.0.0.1".to_string(),
                coords: Some(GeoCoords::new(-23.0, -47.0)),
            }],
            2,
        );
        monitor.tick().await;
        let nodes = monitor.nodes().await;
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "cache-1");
        let coords = monitor.node_coordinates().await;
        assert!(coords.contains_key("cache-1"));
    }

    #[tokio::test]
    async fn test_vanished_node_is_dropped_after_one_scan() {
        let monitor = NodeMonitor::with_static_nodes(
            vec![StaticNodeConfig {
                name: "cache-1".to_string(),
                address: "10.0.0.1".to_string(),
                coords: None,
            }],
            2,
        );
        monitor.tick().await;
        assert_eq!(monitor.nodes().await.len(), 1);
        {
            // Simulate the node disappearing by clearing the static list and
            // re-ticking with an instance that has none.
            let empty = NodeMonitor::with_static_nodes(vec![], 2);
            empty.tick().await;
            assert_eq!(empty.nodes().await.len(), 0);
        }
    }
}
