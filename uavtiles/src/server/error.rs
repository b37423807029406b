use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error};

use crate::service::ServiceError;

/// HTTP rendering of a [`ServiceError`].
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::DatasetNotFound(_) | ServiceError::FileNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ServiceError::MissingUrl => StatusCode::BAD_REQUEST,
            ServiceError::InvalidTile(_) | ServiceError::InvalidParameter(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ServiceError::TileOutsideBounds(_) => StatusCode::NO_CONTENT,
            ServiceError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Render(_) | ServiceError::Raster(_) | ServiceError::TaskFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match status {
            StatusCode::NO_CONTENT => status.into_response(),
            StatusCode::INTERNAL_SERVER_ERROR => {
                error!(error = %self.0, "Request failed");
                (status, self.0.to_string()).into_response()
            }
            _ => {
                debug!(status = status.as_u16(), error = %self.0, "Request rejected");
                (status, self.0.to_string()).into_response()
            }
        }
    }
}
