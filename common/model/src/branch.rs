use serde::{Deserialize, Serialize};

/// How permissions of a new branch are set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionInheritance {
	/// The branch follows the permissions of its source tracker.
	///
	/// Later changes on the source are visible on the branch.
	#[default]
	Inherit,
	/// Permissions of the source tracker are copied once, on creation.
	Copy,
	/// The branch starts without tracker-level permissions.
	///
	/// Only project administrators can access it until permissions are granted.
	Restrict,
}

impl PermissionInheritance {
	pub fn as_key(&self) -> &'static str {
		match self {
			Self::Inherit => "inherit",
			Self::Copy => "copy",
			Self::Restrict => "restrict",
		}
	}
}

/// Classification of a rejected branching request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
	/// No valid actor.
	Unauthorized,
	/// License missing, or the actor lacks branch-admin rights.
	Forbidden,
	/// Tracker does not exist or is invisible to the actor.
	NotFound,
	/// The request itself is malformed.
	InvalidRequest,
}
