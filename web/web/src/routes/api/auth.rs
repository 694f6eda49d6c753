use axum::{
	extract::FromRequestParts,
	http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use ramify_backend_model::actor::Actor;

use super::error::{ApiError, ApiResult};
use crate::WebServices;

/// Extracts the actor authenticated by a bearer token.
pub struct AuthRequired(pub Actor);

impl FromRequestParts<WebServices> for AuthRequired {
	type Rejection = ApiError;

	async fn from_request_parts(
		parts: &mut Parts,
		state: &WebServices,
	) -> Result<Self, Self::Rejection> {
		authenticate(state, &parts.headers).await.map(Self)
	}
}

pub async fn authenticate(services: &WebServices, headers: &HeaderMap) -> ApiResult<Actor> {
	let token = headers
		.get(AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "))
		.map(str::trim)
		.filter(|token| !token.is_empty())
		.ok_or(ApiError::AuthRequired)?;
	services
		.backend
		.catalog
		.authenticate(token)
		.await?
		.ok_or(ApiError::AuthRequired)
}
