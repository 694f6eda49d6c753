//! Collaborator contracts consumed by the branching core.
//!
//! The SQL [`Catalog`](crate::catalog::Catalog) implements the lookups,
//! [`LicenseService`](crate::license::LicenseService) the license gate and
//! [`JobQueue`](crate::job_queue::JobQueue) the job submission.

use std::fmt::Debug;

use futures::future::BoxFuture;
use ramify_backend_model::{
	actor::Actor,
	job::{CreationParameters, JobRef},
	tracker::{ProjectPermission, ProjectRef, ReferenceField, Tracker, TrackerRef},
};

use crate::Result;

/// Predicate selecting reference fields.
pub type FieldFilter<'a> = &'a (dyn Fn(&ReferenceField) -> bool + Send + Sync);

/// Lookup of trackers visible to an actor.
pub trait EntityDirectory
where
	Self: Send + Sync + Debug,
{
	/// Finds a tracker, or `None` when it does not exist or is not visible to `actor`.
	fn find_tracker(&self, actor: &Actor, id: TrackerRef)
	-> BoxFuture<'_, Result<Option<Tracker>>>;

	/// Lists the branches created from `origin`, ordered by id.
	fn find_branches(&self, actor: &Actor, origin: TrackerRef)
	-> BoxFuture<'_, Result<Vec<Tracker>>>;
}

pub trait PermissionService
where
	Self: Send + Sync + Debug,
{
	fn is_project_admin(&self, actor: &Actor, project: ProjectRef) -> BoxFuture<'_, Result<bool>>;

	fn has_permission(
		&self,
		actor: &Actor,
		project: ProjectRef,
		permission: ProjectPermission,
	) -> BoxFuture<'_, Result<bool>>;
}

/// Index of reference fields by the trackers they point at.
pub trait ReferenceIndex
where
	Self: Send + Sync + Debug,
{
	/// Finds reference fields targeting `tracker` which pass `filter`,
	/// together with the tracker owning each field.
	fn incoming_reference_fields<'a>(
		&'a self,
		actor: &'a Actor,
		tracker: &'a Tracker,
		filter: FieldFilter<'a>,
	) -> BoxFuture<'a, Result<Vec<(Tracker, ReferenceField)>>>;
}

pub trait LicenseGate
where
	Self: Send + Sync + Debug,
{
	fn has_branching_license(&self) -> bool;
}

/// Hands fully resolved branch batches to the job runner.
pub trait BranchJobSubmitter
where
	Self: Send + Sync + Debug,
{
	/// Submits a batch without waiting for it to be processed.
	fn submit(
		&self,
		actor: &Actor,
		branches: Vec<CreationParameters>,
		dry_run: bool,
	) -> BoxFuture<'_, Result<JobRef>>;
}
