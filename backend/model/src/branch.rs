use ramify_common_model::branch::PermissionInheritance;
use serde::{Deserialize, Serialize};

use crate::tracker::{BaselineRef, ProjectRef, TrackerRef};

/// A request to branch one tracker, as received from a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRequest {
	/// Tracker to branch.
	pub source: TrackerRef,
	/// Baseline of the source to start from, instead of its current state.
	pub baseline: Option<BaselineRef>,
	/// Name of the new branch, e.g. `1.2`.
	pub name: String,
	/// Key of the new branch.
	///
	/// When absent, the key is derived from the source tracker's key and the name.
	pub key_name: Option<String>,
	/// `#RRGGBB`, `#RGB` or a basic named color.
	pub color: Option<String>,
	pub description: Option<String>,
	pub inheritance: PermissionInheritance,
}

/// A branch which is about to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
	pub name: String,
	pub key_name: String,
	pub color: Option<String>,
	pub description: Option<String>,
	/// Owning project, always the project of the origin.
	pub project: ProjectRef,
	/// The tracker being branched.
	pub origin: TrackerRef,
}

/// Derives the key of a branch from its source key and name.
pub fn derive_key_name(source_key: &str, name: &str) -> String {
	format!("{} \u{00BB} {}", source_key, name)
}
