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

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Content steering library.
//!
//! Owns the node discovery monitor, the dynamic latency oracle, the
//! pluggable bandit selector strategies and the structured feedback logger
//! that together decide which cache a DASH client should be steered to.

pub mod error;
pub mod geo;
pub mod latency_oracle;
pub mod manifest;
pub mod node_monitor;
pub mod selector;
pub mod steering_log;
pub mod time;

pub use error::SteeringError;
pub use error::SteeringErrorKind;
