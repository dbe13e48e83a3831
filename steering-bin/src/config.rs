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

//! Environment-variable driven configuration.

use std::path::PathBuf;

/// Docker network the node monitor inspects for cache containers.
pub fn network_name() -> String {
    env_or_default("STEERING_NETWORK_NAME", "video-streaming_default")
}

/// Node monitor tick interval, in seconds.
pub fn monitor_interval_seconds() -> u64 {
    env_or_default("STEERING_MONITOR_INTERVAL_SECONDS", "2")
        .parse()
        .unwrap_or(2)
}

/// Latency oracle tick interval, in seconds. Clamped to `>= 0.5` by
/// [steering::latency_oracle::LatencyOracle::new].
pub fn oracle_interval_seconds() -> f64 {
    env_or_default("STEERING_ORACLE_INTERVAL_SECONDS", "1")
        .parse()
        .unwrap_or(1.0)
}

/// Address the HTTP server binds to.
pub fn http_bind_address() -> String {
    env_or_default("STEERING_HTTP_BIND_ADDRESS", "0.0.0.0")
}

/// Port the HTTP server binds to.
pub fn http_bind_port() -> u16 {
    env_or_default("STEERING_HTTP_BIND_PORT", "8080")
        .parse()
        .unwrap_or(8080)
}

/// Directory the structured log is written under.
pub fn log_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("STEERING_LOG_DIR") {
        return PathBuf::from(dir);
    }
    let default_dir = std::env::current_dir()
        .unwrap_or_default()
        .join("Graphics")
        .join("Logs");
    log::warn!(
        "Missing env.STEERING_LOG_DIR -> using default value '{}'",
        default_dir.display()
    );
    default_dir
}

/// Get environment variable by name or return a default value if the variable
/// isn't set.
fn env_or_default(name: &str, default_value: &str) -> String {
    std::env::var(name)
        .inspect_err(|_e| log::warn!("Missing env.{name} -> using default value '{default_value}'"))
        .unwrap_or(default_value.to_string())
}
