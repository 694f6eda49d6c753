use ramify_backend_model::{
	branch::{Branch, BranchRequest, derive_key_name},
	job::{BranchReferenceModel, CreationParameters},
	rewrite::RewriteMap,
	tracker::{BaselineRef, Tracker},
};
use ramify_common_model::branch::PermissionInheritance;

use super::{RequestViolation, color::normalize_color};

/// A validated request, waiting for the references of its batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedBranch {
	pub source: Tracker,
	pub branch: Branch,
	pub baseline: Option<BaselineRef>,
	pub inheritance: PermissionInheritance,
}

impl PreparedBranch {
	pub fn new(request: &BranchRequest, source: Tracker) -> Result<Self, RequestViolation> {
		let color = normalize_color(request.color.as_deref())?;
		let name = request.name.trim().to_string();
		let key_name = match request.key_name.as_deref().map(str::trim) {
			Some(key_name) if !key_name.is_empty() => key_name.to_string(),
			_ => derive_key_name(&source.key_name, &name),
		};
		let description = request
			.description
			.as_deref()
			.map(str::trim)
			.filter(|description| !description.is_empty())
			.map(str::to_string);

		let branch = Branch {
			name,
			key_name,
			color,
			description,
			project: source.project,
			origin: source.id,
		};
		Ok(Self {
			source,
			branch,
			baseline: request.baseline,
			inheritance: request.inheritance,
		})
	}

	/// Finishes the parameters with the rewrites of fields owned by the source tracker.
	pub fn into_parameters(self, merged: &RewriteMap) -> CreationParameters {
		let rewrites = merged.restricted_to(self.source.id);
		CreationParameters {
			source: self.source,
			branch: self.branch,
			baseline: self.baseline,
			inheritance: self.inheritance,
			references: BranchReferenceModel::replacing(rewrites),
		}
	}
}
