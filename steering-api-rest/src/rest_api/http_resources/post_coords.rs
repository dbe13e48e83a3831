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

//! Client feedback resource: position updates and experienced latency.

use crate::rest_api::AppState;
use crate::rest_api::common::ApiErrorMapper;
use crate::rest_api::dto::CoordsRequest;
use actix_web::Error;
use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use actix_web::post;
use actix_web::web::Data;
use actix_web::web::Json;

/// Accept client feedback: a position update, experienced latency, or both.
#[utoipa::path(
    tag = "steering",
    request_body = inline(Option<()>),
    responses(
        (status = 200, description = "Feedback accepted and logged."),
        (status = 400, description = "Neither location nor latency feedback was present, or server_used is unknown."),
    ),
)]
#[post("/coords")]
pub async fn post_coords(app_state: Data<AppState>, body: Json<CoordsRequest>) -> Result<HttpResponse, Error> {
    let status = app_state
        .service
        .post_feedback(body.into_inner())
        .await
        .map_err(ApiErrorMapper::from_error)?;
    Ok(HttpResponse::build(StatusCode::OK).body(status))
}
