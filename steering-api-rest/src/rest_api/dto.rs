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

//! Request bodies accepted by the steering front-end.

use serde::Deserialize;

/// `POST /coords` body: client feedback about position and/or experienced
/// latency.
#[derive(Debug, Clone, Deserialize)]
pub struct CoordsRequest {
    /// Client-side simulation clock, if the client reports one.
    pub time: Option<f64>,
    /// Client latitude, in decimal degrees.
    pub lat: Option<f64>,
    /// Client longitude, in decimal degrees. Named `long` on the wire.
    #[serde(rename = "long")]
    pub long: Option<f64>,
    /// Round-trip latency the client experienced, in milliseconds.
    pub rt: Option<f64>,
    /// Name of the cache the client actually used.
    pub server_used: Option<String>,
}

/// `POST /latency_event` body: inject a transient latency modifier.
#[derive(Debug, Clone, Deserialize)]
pub struct LatencyEventRequest {
    /// Name of the cache to apply the modifier to.
    pub server_name: String,
    /// Multiplicative factor applied to the cache's latency.
    pub factor: f64,
    /// How long the modifier stays active. `<= 0` means sticky (never
    /// auto-clears).
    pub duration_seconds: i64,
}
