use axum::{Json, extract::State, response::IntoResponse, response::Response};

use crate::{error::ErrorDetail, response::ApiResponse, state::AppState};

/// In development, replace the generic 500 message with the underlying cause.
pub async fn expose_error_detail(State(state): State<AppState>, mut response: Response) -> Response {
    if !state.config.environment.is_development() {
        return response;
    }
    let Some(ErrorDetail(detail)) = response.extensions_mut().remove::<ErrorDetail>() else {
        return response;
    };
    let status = response.status();
    (status, Json(ApiResponse::failure(detail, None))).into_response()
}
