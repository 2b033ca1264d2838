use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts, http::StatusCode, Json};
use shared::error::{ApiError, ErrorCode};

use crate::{
    api::ApiContext,
    auth::{AuthProvider, Caller},
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) auth: Arc<dyn AuthProvider>,
}

pub(crate) type Rejection = (StatusCode, Json<ApiError>);
pub(crate) type ApiResult<T> = Result<T, Rejection>;

pub(crate) fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn reject(err: ApiError) -> Rejection {
    (status_for(err.code), Json(err))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = Rejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        state
            .auth
            .authenticate(&parts.headers)
            .await
            .map_err(|err| reject(err.into()))
    }
}
