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

//! REST API server and resources.

mod http_resources {
    //! API resources

    pub mod get_decision;
    pub mod post_coords;
    pub mod post_latency_event;
}
mod common {
    //! Common REST API resources and utils.

    mod api_error_mapper;

    pub use api_error_mapper::*;
}
pub mod dto;
pub mod service;

use actix_web::App;
use actix_web::HttpResponse;
use actix_web::HttpServer;
use actix_web::Responder;
use actix_web::get;
use actix_web::http::header::ContentType;
use actix_web::web;
use service::SteeringService;
use std::sync::Arc;
use utoipa::OpenApi;

/// Number of parallel requests that can be served for each assigned CPU core.
const WORKERS_PER_CORE: usize = 1024;

/// Shared state between requests.
#[derive(Clone)]
pub struct AppState {
    service: Arc<SteeringService>,
}

impl AppState {
    /// Build the shared per-worker state from a process-scoped
    /// [SteeringService]. Exposed so integration tests can wire up an
    /// [actix_web::test] service identically to [run_http_server].
    pub fn new(service: Arc<SteeringService>) -> Self {
        Self { service }
    }
}

/// Register the steering HTTP resources on an [actix_web::web::ServiceConfig].
///
/// Shared between [run_http_server] and integration tests so both exercise
/// the exact same routing: `/coords` and `/latency_event` as named
/// resources, [http_resources::get_decision] as the catch-all default
/// service, matching the "GET/POST /<anything>" entry in the endpoint
/// table.
pub fn configure_services(cfg: &mut web::ServiceConfig) {
    cfg.service(web::redirect("/openapi", "/openapi.json"))
        .service(get_openapi)
        .service(http_resources::post_coords::post_coords)
        .service(http_resources::post_latency_event::post_latency_event)
        .default_service(web::to(http_resources::get_decision::get_decision));
}

/// Run the HTTP server to completion.
///
/// Serves the two feedback endpoints (`/coords`, `/latency_event`) as named
/// resources and falls back to [http_resources::get_decision] for every
/// other path, matching the "GET/POST /<anything>" catch-all in the
/// endpoint table.
pub async fn run_http_server(
    service: &Arc<SteeringService>,
    bind_address: &str,
    bind_port: u16,
) -> Result<(), Box<dyn core::error::Error>> {
    let workers = std::thread::available_parallelism()
        .map(|non_zero| non_zero.get())
        .unwrap_or(1);
    let max_connections = WORKERS_PER_CORE * workers;
    log::info!(
        "API described by http://{bind_address}:{bind_port}/openapi.json allows {max_connections} concurrent connections."
    );
    let app_state = AppState::new(Arc::clone(service));
    let app_data = web::Data::<AppState>::new(app_state);

    HttpServer::new(move || App::new().app_data(app_data.clone()).configure(configure_services))
        .workers(workers)
        .backlog(u32::try_from(max_connections / 2).unwrap()) // Default is 2048
        .worker_max_blocking_threads(max_connections)
        .max_connections(max_connections)
        .bind((bind_address, bind_port))?
        .disable_signals()
        .shutdown_timeout(5) // Default 30
        .run()
        .await?;
    Ok(())
}

/// Serve Open API documentation.
#[get("/openapi.json")]
async fn get_openapi() -> impl Responder {
    HttpResponse::Ok()
        .content_type(ContentType::json())
        .body(openapi_as_string())
}

/// Get the OpenAPI definition as a pretty JSON String.
pub fn openapi_as_string() -> String {
    #[derive(OpenApi)]
    #[openapi(
        // Use Cargo.toml as source for the "info" section
        paths(http_resources::post_coords::post_coords, http_resources::post_latency_event::post_latency_event,)
    )]
    struct ApiDoc;
    ApiDoc::openapi().to_pretty_json().unwrap()
}
