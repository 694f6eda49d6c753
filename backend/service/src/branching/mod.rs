//! Batch branch creation.
//!
//! A batch is handled in four steps:
//!
//! 1. The branching license is checked once.
//! 2. Every request is validated on its own, in batch order. The first
//!    violation rejects the whole batch and nothing is submitted.
//! 3. For every validated source tracker, reference fields of other trackers
//!    of the same batch which point at it are resolved into a [RewriteMap].
//! 4. One [CreationParameters] record per request is assembled, in batch order,
//!    and handed to the job runner without waiting for it.

use std::sync::Arc;

use ramify_backend_model::{
	actor::Actor,
	branch::BranchRequest,
	job::{CreationParameters, JobRef},
	rewrite::RewriteMap,
	tracker::{ProjectRef, Tracker, TrackerKind, TrackerRef},
};
use ramify_common_model::branch::FailureKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
	Result,
	directory::{
		BranchJobSubmitter, EntityDirectory, LicenseGate, PermissionService, ReferenceIndex,
	},
};

pub mod assemble;
pub mod color;
pub mod resolve;
pub mod validate;

#[cfg(test)]
pub(crate) mod fake;

use assemble::PreparedBranch;
use color::ColorError;
use resolve::ReferenceResolver;
use validate::{RequestValidator, ValidationError};

/// Services the branching core depends on.
#[derive(Debug, Clone)]
pub struct Collaborators {
	pub directory: Arc<dyn EntityDirectory>,
	pub permissions: Arc<dyn PermissionService>,
	pub references: Arc<dyn ReferenceIndex>,
	pub license: Arc<dyn LicenseGate>,
	pub jobs: Arc<dyn BranchJobSubmitter>,
}

/// Receipt of an accepted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceipt {
	pub job: JobRef,
	/// Number of branches submitted.
	pub branches: usize,
}

#[derive(Debug)]
pub struct BranchingService {
	collaborators: Collaborators,
}

impl BranchingService {
	pub fn new(collaborators: Collaborators) -> Self {
		Self { collaborators }
	}

	/// Validates and resolves a batch into creation parameters without submitting it.
	#[tracing::instrument(skip(self, requests), fields(actor = actor.id, batch = requests.len()))]
	pub async fn prepare(
		&self,
		actor: &Actor,
		requests: &[BranchRequest],
	) -> Result<Vec<CreationParameters>> {
		let c = &self.collaborators;
		if !c.license.has_branching_license() {
			warn!("rejected branch batch without branching license");
			return Err(BranchingError::MissingLicense.into());
		}
		if requests.is_empty() {
			return Err(BranchingError::EmptyBatch.into());
		}

		let validator = RequestValidator {
			directory: c.directory.as_ref(),
			permissions: c.permissions.as_ref(),
		};
		let mut prepared = Vec::<PreparedBranch>::with_capacity(requests.len());
		for (index, request) in requests.iter().enumerate() {
			let reject = |violation| BranchingError::Rejected {
				index,
				tracker: request.source,
				violation,
			};
			if prepared.iter().any(|p| p.source.id == request.source) {
				return Err(reject(RequestViolation::DuplicateSource).into());
			}
			let tracker = match validator.validate(actor, request).await {
				Ok(tracker) => tracker,
				Err(ValidationError::Violation(violation)) => {
					info!(index, tracker = request.source, %violation, "rejected branch request");
					return Err(reject(violation).into());
				}
				Err(ValidationError::Backend(error)) => return Err(error),
			};
			prepared.push(PreparedBranch::new(request, tracker).map_err(reject)?);
		}

		let batch = prepared.iter().map(|p| p.source.id).collect::<Vec<_>>();
		let resolver = ReferenceResolver {
			references: c.references.as_ref(),
		};
		let mut merged = RewriteMap::new();
		for p in &prepared {
			merged.merge(resolver.resolve(actor, &batch, &p.source, &p.branch).await?);
		}

		Ok(prepared
			.into_iter()
			.map(|p| p.into_parameters(&merged))
			.collect())
	}

	/// Prepares a batch and submits it to the job runner.
	#[tracing::instrument(skip(self, requests), fields(actor = actor.id, batch = requests.len()))]
	pub async fn submit_batch(
		&self,
		actor: &Actor,
		requests: &[BranchRequest],
		dry_run: bool,
	) -> Result<BatchReceipt> {
		let branches = self.prepare(actor, requests).await?;
		let count = branches.len();
		let job = self
			.collaborators
			.jobs
			.submit(actor, branches, dry_run)
			.await?;
		info!(%job, branches = count, dry_run, "submitted branch batch");
		Ok(BatchReceipt {
			job,
			branches: count,
		})
	}

	/// Lists the branches of `tracker`.
	pub async fn list_branches(&self, actor: &Actor, tracker: TrackerRef) -> Result<Vec<Tracker>> {
		let c = &self.collaborators;
		if c.directory.find_tracker(actor, tracker).await?.is_none() {
			return Err(BranchingError::TrackerNotFound(tracker).into());
		}
		c.directory.find_branches(actor, tracker).await
	}
}

/// Reasons for rejecting a single branch request.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RequestViolation {
	#[error("tracker does not exist or is not visible")]
	TrackerNotFound,
	#[error("trackers of kind {0} cannot be branched")]
	NonBranchable(TrackerKind),
	#[error("branch administration of project {0} is not permitted")]
	NoBranchPermission(ProjectRef),
	#[error(transparent)]
	InvalidColor(#[from] ColorError),
	#[error("branch name is blank")]
	BlankName,
	#[error("tracker is already branched by an earlier request of the batch")]
	DuplicateSource,
}

impl RequestViolation {
	pub fn kind(&self) -> FailureKind {
		match self {
			Self::TrackerNotFound => FailureKind::NotFound,
			Self::NoBranchPermission(_) => FailureKind::Forbidden,
			Self::NonBranchable(_)
			| Self::InvalidColor(_)
			| Self::BlankName
			| Self::DuplicateSource => FailureKind::InvalidRequest,
		}
	}
}

#[derive(Debug, Error)]
pub enum BranchingError {
	#[error("branching is not licensed")]
	MissingLicense,
	#[error("no branches requested")]
	EmptyBatch,
	#[error("branch request {index} for tracker {tracker} rejected: {violation}")]
	Rejected {
		index: usize,
		tracker: TrackerRef,
		violation: RequestViolation,
	},
	#[error("tracker {0} does not exist or is not visible")]
	TrackerNotFound(TrackerRef),
}

impl BranchingError {
	pub fn kind(&self) -> FailureKind {
		match self {
			Self::MissingLicense => FailureKind::Forbidden,
			Self::EmptyBatch => FailureKind::InvalidRequest,
			Self::Rejected { violation, .. } => violation.kind(),
			Self::TrackerNotFound(_) => FailureKind::NotFound,
		}
	}

	/// Index of the offending request in its batch.
	pub fn index(&self) -> Option<usize> {
		match self {
			Self::Rejected { index, .. } => Some(*index),
			_ => None,
		}
	}

	pub fn tracker(&self) -> Option<TrackerRef> {
		match self {
			Self::Rejected { tracker, .. } | Self::TrackerNotFound(tracker) => Some(*tracker),
			_ => None,
		}
	}
}
