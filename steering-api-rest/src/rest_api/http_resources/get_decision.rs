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

//! Catch-all resource serving the steering manifest for any path.

use crate::rest_api::AppState;
use crate::rest_api::common::ApiErrorMapper;
use actix_web::Error;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::http::StatusCode;
use actix_web::web::Data;

/// Respond to `GET`/`POST /<anything>` with a steering manifest ranking the
/// current cache set for this client.
///
/// Registered as Actix-web's `default_service`, so it only matches requests
/// that don't hit `/coords` or `/latency_event`, which is exactly "any path
/// other than the feedback endpoints" per the spec's endpoint table.
pub async fn get_decision(app_state: Data<AppState>, http_request: HttpRequest) -> Result<HttpResponse, Error> {
    let connection_info = http_request.connection_info();
    let reload_uri = format!(
        "{}://{}{}",
        connection_info.scheme(),
        connection_info.host(),
        http_request.path()
    );
    let manifest = app_state
        .service
        .get_decision(reload_uri)
        .await
        .map_err(ApiErrorMapper::from_error)?;
    Ok(HttpResponse::build(StatusCode::OK).json(manifest))
}
