use axum::{
	Json,
	extract::{Path, Query, State},
	http::StatusCode,
};
use ramify_backend_model::{branch::BranchRequest, tracker::TrackerRef};
use ramify_web_api_model::branch::{
	ApiBatchAccepted, ApiCreateBranch, ApiCreateBranches, ApiCreateBranchesQuery,
	ApiReferenceType, ApiTrackerReference,
};

use super::{auth::AuthRequired, error::ApiResult};
use crate::WebServices;

fn into_request(branch: ApiCreateBranch) -> BranchRequest {
	BranchRequest {
		source: branch.source.id,
		baseline: branch.baseline_id,
		name: branch.name,
		key_name: branch.key_name,
		color: branch.color,
		description: branch.description,
		inheritance: branch.permission_inheritance.unwrap_or_default(),
	}
}

pub async fn create_branches(
	AuthRequired(actor): AuthRequired,
	State(services): State<WebServices>,
	Query(query): Query<ApiCreateBranchesQuery>,
	Json(body): Json<ApiCreateBranches>,
) -> ApiResult<(StatusCode, Json<ApiBatchAccepted>)> {
	let requests = body
		.branches
		.into_iter()
		.map(into_request)
		.collect::<Vec<_>>();
	let receipt = services
		.backend
		.branching
		.submit_batch(&actor, &requests, query.dry_run)
		.await?;
	Ok((
		StatusCode::ACCEPTED,
		Json(ApiBatchAccepted {
			job: receipt.job.to_string(),
			branches: receipt.branches,
		}),
	))
}

pub async fn list_branches(
	AuthRequired(actor): AuthRequired,
	State(services): State<WebServices>,
	Path(tracker_id): Path<TrackerRef>,
) -> ApiResult<Json<Vec<ApiTrackerReference>>> {
	let branches = services
		.backend
		.branching
		.list_branches(&actor, tracker_id)
		.await?;
	Ok(Json(
		branches
			.into_iter()
			.map(|tracker| ApiTrackerReference {
				id: tracker.id,
				name: tracker.name,
				kind: ApiReferenceType::TrackerReference,
			})
			.collect(),
	))
}
