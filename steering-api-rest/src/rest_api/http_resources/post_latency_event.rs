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

//! Operator resource: inject a transient or sticky latency modifier on a
//! named cache, for chaos-testing the bandit strategies.

use crate::rest_api::AppState;
use crate::rest_api::common::ApiErrorMapper;
use crate::rest_api::dto::LatencyEventRequest;
use actix_web::Error;
use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use actix_web::post;
use actix_web::web::Data;
use actix_web::web::Json;

/// Apply a latency modifier to a named cache.
#[utoipa::path(
    tag = "steering",
    request_body = inline(Option<()>),
    responses(
        (status = 200, description = "Modifier applied."),
        (status = 400, description = "factor was not a positive, finite number."),
    ),
)]
#[post("/latency_event")]
pub async fn post_latency_event(app_state: Data<AppState>, body: Json<LatencyEventRequest>) -> Result<HttpResponse, Error> {
    let body = body.into_inner();
    app_state
        .service
        .apply_latency_event(&body.server_name, body.factor, body.duration_seconds as f64)
        .await
        .map_err(ApiErrorMapper::from_error)?;
    Ok(HttpResponse::build(StatusCode::OK).body("applied"))
}
