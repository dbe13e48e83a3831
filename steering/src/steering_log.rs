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

//! Append-only CSV log of per-feedback decision/outcome records.

use crate::error::SteeringError;
use crate::error::SteeringErrorKind;
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

/// One row of the structured log. Field order is contractual: it becomes
/// the CSV header, in declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    /// Wall-clock time on the server when the row was written, in seconds
    /// since the Unix epoch.
    pub timestamp_server: f64,
    /// Client-reported `time` field, if present on the request.
    pub sim_time_client: Option<f64>,
    /// Client latitude, if reported.
    pub client_lat: Option<f64>,
    /// Client longitude, if reported.
    pub client_lon: Option<f64>,
    /// The cache the client reports having used for this feedback.
    pub server_used_for_latency: Option<String>,
    /// Client-reported round-trip latency, in milliseconds.
    #[serde(rename = "experienced_latency_ms_CLIENT")]
    pub experienced_latency_ms_client: Option<f64>,
    /// Oracle latency for `server_used_for_latency` at feedback time.
    #[serde(rename = "experienced_latency_ms_ORACLE")]
    pub experienced_latency_ms_oracle: Option<f64>,
    /// Equal to `experienced_latency_ms_oracle`; this is what the bandit
    /// learned from.
    pub experienced_latency_ms: Option<f64>,
    /// JSON-serialized `name -> latency_ms` snapshot across all caches.
    pub all_servers_oracle_latency_json: Option<String>,
    /// The arm that was returned as position 0 on the most recent decision.
    pub steering_decision_main_server: Option<String>,
    /// Name of the active bandit strategy.
    pub rl_strategy: String,
    /// JSON-serialized per-arm counts, strategy-dependent.
    pub rl_counts_json: Option<String>,
    /// JSON-serialized per-arm actual pull counts; only populated for D-UCB.
    pub rl_actual_counts_json: Option<String>,
    /// JSON-serialized per-arm values, strategy-dependent.
    pub rl_values_json: Option<String>,
    /// Discount factor in effect; only populated for D-UCB.
    pub gamma_value: Option<f64>,
}

/** Single append-only CSV log writer for one process run.

One row is written per accepted `/coords` call, whether or not it carried
latency feedback. The underlying file handle is single-writer; callers
serialize through the internal lock.
*/
pub struct StructuredLogger {
    writer: Mutex<csv::Writer<File>>,
    path: PathBuf,
}

impl StructuredLogger {
    /// Create a new log file under `dir`, named
    /// `log_<strategy><suffix>_<N>.csv` where `N` is the lowest integer for
    /// which the file does not already exist. `dir` is created if missing.
    pub fn new(dir: &Path, strategy: &str, suffix: &str) -> Result<Self, SteeringError> {
        std::fs::create_dir_all(dir).map_err(|e| {
            SteeringErrorKind::Unspecified
                .error_with_msg(format!("Failed to create log directory '{}': {e}", dir.display()))
        })?;
        let path = Self::pick_path(dir, strategy, suffix);
        let writer = csv::Writer::from_path(&path).map_err(|e| {
            SteeringErrorKind::Unspecified
                .error_with_msg(format!("Failed to open log file '{}': {e}", path.display()))
        })?;
        Ok(Self {
            writer: Mutex::new(writer),
            path,
        })
    }

    fn pick_path(dir: &Path, strategy: &str, suffix: &str) -> PathBuf {
        for n in 0.. {
            let candidate = dir.join(format!("log_{strategy}{suffix}_{n}.csv"));
            if !candidate.exists() {
                return candidate;
            }
        }
        unreachable!("integer counter is unbounded")
    }

    /// The path this logger is writing to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row. Serializes and flushes under the single lock, so
    /// row order matches call-arrival order.
    pub fn log(&self, record: &LogRecord) -> Result<(), SteeringError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| SteeringErrorKind::Unspecified.error_with_msg("log writer lock poisoned"))?;
        writer
            .serialize(record)
            .and_then(|()| writer.flush().map_err(csv::Error::from))
            .map_err(|e| SteeringErrorKind::Unspecified.error_with_msg(format!("Failed to write log row: {e}")))
    }
}

mod test {
    use super::*;

    fn sample_record(strategy: &str) -> LogRecord {
        LogRecord {
            timestamp_server: 1000.0,
            sim_time_client: Some(1.0),
            client_lat: Some(-23.0),
            client_lon: Some(-47.0),
            server_used_for_latency: Some("c1".to_string()),
            experienced_latency_ms_client: Some(42.0),
            experienced_latency_ms_oracle: Some(40.0),
            experienced_latency_ms: Some(40.0),
            all_servers_oracle_latency_json: Some("{\"c1\":40.0}".to_string()),
            steering_decision_main_server: Some("c1".to_string()),
            rl_strategy: strategy.to_string(),
            rl_counts_json: Some("{\"c1\":1}".to_string()),
            rl_actual_counts_json: None,
            rl_values_json: Some("{\"c1\":40.0}".to_string()),
            gamma_value: None,
        }
    }

    #[test]
    fn test_rows_and_header_are_written() {
        let dir = std::env::temp_dir().join(format!(
            "steering_log_test_{}",
            crate::time::get_timestamp_micros()
        ));
        let logger = StructuredLogger::new(&dir, "epsilon_greedy", "").unwrap();
        logger.log(&sample_record("epsilon_greedy")).unwrap();
        logger.log(&sample_record("epsilon_greedy")).unwrap();
        let contents = std::fs::read_to_string(logger.path()).unwrap();
        let mut lines = contents.lines();
        let header = lines.next().unwrap();
        assert_eq!(header.split(',').count(), 15);
        assert_eq!(lines.count(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_filenames_avoid_collisions() {
        let dir = std::env::temp_dir().join(format!(
            "steering_log_test_collision_{}",
            crate::time::get_timestamp_micros()
        ));
        let first = StructuredLogger::new(&dir, "random", "").unwrap();
        let second = StructuredLogger::new(&dir, "random", "").unwrap();
        assert_ne!(first.path(), second.path());
        std::fs::remove_dir_all(&dir).ok();
    }
}
