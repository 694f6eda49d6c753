use ramify_common_model::branch::FailureKind;
use serde::{Deserialize, Serialize};

/// Body of failed requests.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFailure {
	pub kind: FailureKind,
	/// Index of the rejected request in its batch.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub index: Option<usize>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tracker: Option<i64>,
	pub message: String,
}
