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

//! End-to-end exercise of the two request endpoints, backed by a static
//! (Docker-free) node monitor so the scenarios are deterministic.

use actix_web::App;
use actix_web::test;
use actix_web::web;
use serde_json::Value;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use steering::geo::GeoCoords;
use steering::node_monitor::NodeMonitor;
use steering::node_monitor::StaticNodeConfig;
use steering_api_rest::rest_api::AppState;
use steering_api_rest::rest_api::configure_services;
use steering_api_rest::rest_api::service::SteeringService;
use steering_api_rest::rest_api::service::SteeringServiceConfig;

fn three_node_monitor() -> Arc<NodeMonitor> {
    NodeMonitor::with_static_nodes(
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
    )
}

fn temp_log_dir(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "steering_http_test_{label}_{}",
        steering::time::get_timestamp_micros()
    ))
}

async fn build_service(strategy_name: &str, label: &str) -> Arc<SteeringService> {
    build_service_with_monitor(strategy_name, label, three_node_monitor()).await
}

async fn build_service_with_monitor(
    strategy_name: &str,
    label: &str,
    monitor: Arc<NodeMonitor>,
) -> Arc<SteeringService> {
    monitor.tick().await;
    let config = SteeringServiceConfig {
        strategy_name: strategy_name.to_string(),
        epsilon: 0.1,
        network_name: String::new(),
        monitor_interval_seconds: 2,
        oracle_interval_seconds: 1.0,
        log_dir: temp_log_dir(label),
        log_suffix: String::new(),
    };
    let service = SteeringService::new_with_node_monitor(config, monitor).unwrap();
    service.oracle_tick_for_test().await;
    service
}

/// Node names matching [steering::latency_oracle::LatencyOracle]'s fixed
/// baseline latencies, so an applied event modifier's effect on ranking is
/// deterministic rather than riding on the random unknown-cache baseline.
fn three_fixed_baseline_node_monitor() -> Arc<NodeMonitor> {
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
            StaticNodeConfig {
                name: "cache-3".to_string(),
                address: "10.0.0.3".to_string(),
                coords: Some(GeoCoords::new(-23.0, -47.0)),
            },
        ],
        2,
    )
}

#[actix_web::test]
async fn test_get_decision_returns_a_steering_manifest() {
    let service = build_service("no_steering", "manifest").await;
    let app_data = web::Data::new(AppState::new(service));
    let app = test::init_service(App::new().app_data(app_data).configure(configure_services)).await;

    let req = test::TestRequest::get().uri("/vod/manifest").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["PATHWAY-PRIORITY"], json!(["c1", "c2", "c3", "cloud"]));
    assert_eq!(body["PATHWAY-CLONES"].as_array().unwrap().len(), 3);
    assert!(body["RELOAD-URI"].as_str().unwrap().ends_with("/vod/manifest"));
}

#[actix_web::test]
async fn test_post_coords_with_feedback_is_logged() {
    let service = build_service("epsilon_greedy", "coords").await;
    let app_data = web::Data::new(AppState::new(service));
    let app = test::init_service(App::new().app_data(app_data).configure(configure_services)).await;

    let req = test::TestRequest::post()
        .uri("/coords")
        .set_json(json!({
            "time": 1.0,
            "lat": -23.0,
            "long": -47.0,
            "rt": 42.0,
            "server_used": "c1",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body = test::read_body(resp).await;
    assert_eq!(body, "logged");
}

#[actix_web::test]
async fn test_post_coords_rejects_unknown_server() {
    let service = build_service("random", "unknown_server").await;
    let app_data = web::Data::new(AppState::new(service));
    let app = test::init_service(App::new().app_data(app_data).configure(configure_services)).await;

    let req = test::TestRequest::post()
        .uri("/coords")
        .set_json(json!({"rt": 10.0, "server_used": "ghost"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_post_coords_rejects_empty_body() {
    let service = build_service("random", "empty_body").await;
    let app_data = web::Data::new(AppState::new(service));
    let app = test::init_service(App::new().app_data(app_data).configure(configure_services)).await;

    let req = test::TestRequest::post().uri("/coords").set_json(json!({})).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn test_latency_event_then_oracle_best_ranks_affected_cache_last() {
    let service = build_service_with_monitor(
        "oracle_best_choice",
        "latency_event",
        three_fixed_baseline_node_monitor(),
    )
    .await;
    let app_data = web::Data::new(AppState::new(Arc::clone(&service)));
    let app = test::init_service(App::new().app_data(app_data).configure(configure_services)).await;

    // cache-1's fixed baseline (30ms) times 20 dwarfs cache-3's fixed
    // baseline (125ms) well beyond the oracle's noise, so the ranking
    // change is deterministic rather than riding on random jitter.
    let req = test::TestRequest::post()
        .uri("/latency_event")
        .set_json(json!({"server_name": "cache-1", "factor": 20.0, "duration_seconds": 10}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    service.oracle_tick_for_test().await;

    let req = test::TestRequest::get().uri("/vod/manifest").to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    let priority = body["PATHWAY-PRIORITY"].as_array().unwrap();
    assert_eq!(priority.last().unwrap(), "cloud");
    assert_eq!(priority[priority.len() - 2], "cache-1");
}

#[actix_web::test]
async fn test_latency_event_rejects_non_positive_factor() {
    let service = build_service("random", "bad_factor").await;
    let app_data = web::Data::new(AppState::new(service));
    let app = test::init_service(App::new().app_data(app_data).configure(configure_services)).await;

    let req = test::TestRequest::post()
        .uri("/latency_event")
        .set_json(json!({"server_name": "c1", "factor": 0.0, "duration_seconds": 10}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}
