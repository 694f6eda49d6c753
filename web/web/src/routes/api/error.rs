use axum::{
	Json,
	http::StatusCode,
	response::{AppendHeaders, IntoResponse, Response},
};
use ramify_backend_service::BackendError;
use ramify_common_model::branch::FailureKind;
use ramify_web_api_model::error::ApiFailure;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
	#[error(transparent)]
	BackendError(BackendError),

	#[error("authentication is required")]
	AuthRequired,
}

pub fn status_of(kind: FailureKind) -> StatusCode {
	match kind {
		FailureKind::Unauthorized => StatusCode::UNAUTHORIZED,
		FailureKind::Forbidden => StatusCode::FORBIDDEN,
		FailureKind::NotFound => StatusCode::NOT_FOUND,
		FailureKind::InvalidRequest => StatusCode::BAD_REQUEST,
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		match self {
			ApiError::AuthRequired => (
				StatusCode::UNAUTHORIZED,
				AppendHeaders([("WWW-Authenticate", "Bearer")]),
				Json(ApiFailure {
					kind: FailureKind::Unauthorized,
					index: None,
					tracker: None,
					message: "authentication is required".to_string(),
				}),
			)
				.into_response(),
			ApiError::BackendError(BackendError::BranchingError(failure)) => {
				let kind = failure.kind();
				(
					status_of(kind),
					Json(ApiFailure {
						kind,
						index: failure.index(),
						tracker: failure.tracker(),
						message: failure.to_string(),
					}),
				)
					.into_response()
			}
			ApiError::BackendError(error) => {
				error!(%error, "failed to handle API request");
				(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
			}
		}
	}
}

impl<T: Into<BackendError>> From<T> for ApiError {
	fn from(value: T) -> Self {
		Self::BackendError(value.into())
	}
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;
