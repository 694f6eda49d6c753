use ramify_backend_model::{
	actor::Actor,
	branch::BranchRequest,
	tracker::{ProjectPermission, Tracker},
};

use super::{RequestViolation, color::normalize_color};
use crate::{
	BackendError,
	directory::{EntityDirectory, PermissionService},
};

/// Outcome of a failed validation.
#[derive(Debug)]
pub enum ValidationError {
	/// The request itself is not acceptable.
	Violation(RequestViolation),
	/// A collaborator failed while checking the request.
	Backend(BackendError),
}

impl From<RequestViolation> for ValidationError {
	fn from(value: RequestViolation) -> Self {
		Self::Violation(value)
	}
}

impl From<BackendError> for ValidationError {
	fn from(value: BackendError) -> Self {
		Self::Backend(value)
	}
}

/// Checks a single branch request, independently of the rest of its batch.
pub struct RequestValidator<'a> {
	pub directory: &'a dyn EntityDirectory,
	pub permissions: &'a dyn PermissionService,
}

impl RequestValidator<'_> {
	/// Validates `request` and resolves its source tracker.
	///
	/// Checks run in order: color, name, lookup, kind and permission.
	pub async fn validate(
		&self,
		actor: &Actor,
		request: &BranchRequest,
	) -> Result<Tracker, ValidationError> {
		normalize_color(request.color.as_deref()).map_err(RequestViolation::from)?;
		if request.name.trim().is_empty() {
			return Err(RequestViolation::BlankName.into());
		}

		let tracker = self
			.directory
			.find_tracker(actor, request.source)
			.await?
			.ok_or(RequestViolation::TrackerNotFound)?;
		if !tracker.kind.is_branchable() {
			return Err(RequestViolation::NonBranchable(tracker.kind).into());
		}

		let permissions = self.permissions;
		let allowed = permissions.is_project_admin(actor, tracker.project).await?
			|| permissions
				.has_permission(actor, tracker.project, ProjectPermission::BranchAdmin)
				.await?;
		if !allowed {
			return Err(RequestViolation::NoBranchPermission(tracker.project).into());
		}

		Ok(tracker)
	}
}
