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

//! Geographic coordinates and distance.

/// Earth radius used for the Haversine distance, in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCoords {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
}

impl GeoCoords {
    /// Return a new instance.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Return the great-circle distance between `from` and `to`, in kilometers.
pub fn haversine_distance_km(from: &GeoCoords, to: &GeoCoords) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lon = (to.lon - from.lon).to_radians();
    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

mod test {
    use super::*;

    #[test]
    fn test_distance_to_self_is_zero() {
        let p = GeoCoords::new(-23.0, -47.0);
        assert_eq!(haversine_distance_km(&p, &p), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let p = GeoCoords::new(-23.0, -47.0);
        let q = GeoCoords::new(40.7128, -74.006);
        let d1 = haversine_distance_km(&p, &q);
        let d2 = haversine_distance_km(&q, &p);
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn test_known_distance_is_approximately_correct() {
        // Sao Paulo area to a point roughly 1km north.
        let p = GeoCoords::new(-23.0, -47.0);
        let q = GeoCoords::new(-23.009, -47.0);
        let d = haversine_distance_km(&p, &q);
        assert!((d - 1.0).abs() < 0.05);
    }
}
