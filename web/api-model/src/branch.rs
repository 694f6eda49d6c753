use ramify_common_model::branch::PermissionInheritance;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/v3/create-branches`.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCreateBranches {
	pub branches: Vec<ApiCreateBranch>,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCreateBranch {
	pub source: ApiTrackerId,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub baseline_id: Option<i64>,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub key_name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub color: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Defaults to [PermissionInheritance::Inherit].
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub permission_inheritance: Option<PermissionInheritance>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct ApiTrackerId {
	pub id: i64,
}

/// Query parameters of `POST /api/v3/create-branches`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCreateBranchesQuery {
	#[serde(default)]
	pub dry_run: bool,
}

/// Response of an accepted batch.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBatchAccepted {
	/// UUID of the queued job.
	pub job: String,
	/// Number of branches to be created.
	pub branches: usize,
}

/// Reference to a tracker, as listed by `GET /api/v3/trackers/{trackerId}/branches`.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ApiTrackerReference {
	pub id: i64,
	pub name: String,
	#[serde(rename = "type")]
	pub kind: ApiReferenceType,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum ApiReferenceType {
	TrackerReference,
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_create_branches_body() {
		let body: ApiCreateBranches = serde_json::from_str(
			r##"{ "branches": [ {
				"source": { "id": 1 },
				"baselineId": 3,
				"name": "1.2",
				"keyName": "PROD » 1.2",
				"color": "#ffab46",
				"permissionInheritance": "copy"
			}, {
				"source": { "id": 2 },
				"name": "1.2"
			} ] }"##,
		)
		.unwrap();
		assert_eq!(body.branches.len(), 2);
		let first = &body.branches[0];
		assert_eq!(first.source.id, 1);
		assert_eq!(first.baseline_id, Some(3));
		assert_eq!(first.key_name.as_deref(), Some("PROD » 1.2"));
		assert_eq!(first.permission_inheritance, Some(PermissionInheritance::Copy));
		assert_eq!(body.branches[1].color, None);
		assert_eq!(body.branches[1].permission_inheritance, None);
	}

	#[test]
	fn test_tracker_reference() {
		let reference = ApiTrackerReference {
			id: 7,
			name: "1.2".to_string(),
			kind: ApiReferenceType::TrackerReference,
		};
		assert_eq!(
			serde_json::to_value(&reference).unwrap(),
			serde_json::json!({ "id": 7, "name": "1.2", "type": "TrackerReference" })
		);
	}
}
