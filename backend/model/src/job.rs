use kstring::KString;
use ramify_common_model::branch::PermissionInheritance;
use serde::{Deserialize, Serialize, ser::Error as _};
use uuid::Uuid;

use crate::{
	actor::Actor,
	branch::Branch,
	rewrite::RewriteMap,
	tracker::{BaselineRef, Tracker},
};

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(tag = "t", content = "c", rename_all = "kebab-case")]
pub enum JobCommand {
	/// Create a batch of branches.
	CreateBranches(CreateBranchesJob),
}

impl JobCommand {
	/// Splits the command into its kind and payload.
	pub fn serialize(&self) -> serde_json::Result<(KString, serde_json::Value)> {
		let serde_json::Value::Object(mut value) = serde_json::to_value(self)? else {
			return Err(serde_json::Error::custom("job command is not an object"));
		};
		let kind = match value.remove("t") {
			Some(serde_json::Value::String(kind)) => KString::from_string(kind),
			_ => return Err(serde_json::Error::custom("job command has no kind")),
		};
		Ok((kind, value.remove("c").unwrap_or_default()))
	}

	pub fn deserialize(kind: &str, value: serde_json::Value) -> serde_json::Result<Self> {
		let value = serde_json::json!({ "t": kind, "c": value });
		serde_json::from_value(value)
	}
}

/// A fully resolved batch of branches to create.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct CreateBranchesJob {
	/// Account which requested the batch.
	pub actor: Actor,
	/// One entry per requested branch, in request order.
	pub branches: Vec<CreationParameters>,
	/// When set, the runner plans the batch without writing anything.
	pub dry_run: bool,
}

/// Everything needed to create one branch.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct CreationParameters {
	pub source: Tracker,
	pub branch: Branch,
	pub baseline: Option<BaselineRef>,
	pub inheritance: PermissionInheritance,
	pub references: BranchReferenceModel,
}

/// How references are handled when a branch is created.
#[derive(Debug, PartialEq, Eq, Clone, Default, Serialize, Deserialize)]
pub struct BranchReferenceModel {
	/// Redirect reference fields listed in `rewrites` to the new branches.
	pub replace_incoming_references: bool,
	/// Fields of the source tracker to redirect.
	pub rewrites: RewriteMap,
}

impl BranchReferenceModel {
	pub fn replacing(rewrites: RewriteMap) -> Self {
		Self {
			replace_incoming_references: true,
			rewrites,
		}
	}
}

pub type JobRef = Uuid;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Job {
	pub id: JobRef,
	pub command: JobCommand,
}
