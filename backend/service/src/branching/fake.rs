//! In-memory collaborators for branching tests.

use std::sync::Mutex;

use futures::{
	FutureExt,
	future::{BoxFuture, ready},
};
use kstring::KString;
use ramify_backend_model::{
	actor::{AccountRef, Actor},
	branch::{Branch, BranchRequest, derive_key_name},
	job::{CreationParameters, JobRef},
	tracker::{
		FieldRef, ProjectPermission, ProjectRef, ReferenceField, Tracker, TrackerKind, TrackerRef,
	},
};
use ramify_common_model::branch::PermissionInheritance;
use uuid::Uuid;

use crate::{
	Result,
	directory::{
		BranchJobSubmitter, EntityDirectory, FieldFilter, LicenseGate, PermissionService,
		ReferenceIndex,
	},
};

pub fn alice() -> Actor {
	Actor {
		id: 1,
		name: KString::from_static("alice"),
	}
}

pub fn request(source: TrackerRef, name: &str) -> BranchRequest {
	BranchRequest {
		source,
		baseline: None,
		name: name.to_string(),
		key_name: None,
		color: None,
		description: None,
		inheritance: PermissionInheritance::Inherit,
	}
}

pub fn branch_of(source: &Tracker, name: &str) -> Branch {
	Branch {
		name: name.to_string(),
		key_name: derive_key_name(&source.key_name, name),
		color: None,
		description: None,
		project: source.project,
		origin: source.id,
	}
}

/// Catalog where every account sees every tracker, except hidden ones.
#[derive(Debug, Default)]
pub struct FakeCatalog {
	trackers: Vec<Tracker>,
	hidden: Vec<TrackerRef>,
	fields: Vec<(ReferenceField, Vec<TrackerRef>)>,
	grants: Vec<(AccountRef, ProjectRef, ProjectPermission)>,
}

impl FakeCatalog {
	pub fn tracker(&mut self, id: TrackerRef, project: ProjectRef, key: &str, kind: TrackerKind) {
		self.trackers.push(Tracker {
			id,
			project,
			name: format!("{key} tracker"),
			key_name: key.to_string(),
			kind,
			origin: None,
		});
	}

	pub fn hidden_tracker(
		&mut self,
		id: TrackerRef,
		project: ProjectRef,
		key: &str,
		kind: TrackerKind,
	) {
		self.tracker(id, project, key, kind);
		self.hidden.push(id);
	}

	pub fn branch(&mut self, id: TrackerRef, origin: TrackerRef, key: &str) {
		let source = self.get(origin);
		self.trackers.push(Tracker {
			id,
			key_name: key.to_string(),
			origin: Some(origin),
			..source
		});
	}

	pub fn field(&mut self, id: FieldRef, tracker: TrackerRef, label: &str, targets: &[TrackerRef]) {
		self.fields.push((
			ReferenceField {
				id,
				tracker,
				label: label.to_string(),
			},
			targets.to_vec(),
		));
	}

	pub fn admin(&mut self, account: AccountRef, project: ProjectRef) {
		self.grants.push((account, project, ProjectPermission::Admin));
	}

	pub fn branch_admin(&mut self, account: AccountRef, project: ProjectRef) {
		self.grants
			.push((account, project, ProjectPermission::BranchAdmin));
	}

	pub fn get(&self, id: TrackerRef) -> Tracker {
		self.lookup(id).unwrap()
	}

	fn lookup(&self, id: TrackerRef) -> Option<Tracker> {
		self.trackers
			.iter()
			.find(|tracker| tracker.id == id && !self.hidden.contains(&id))
			.cloned()
	}

	fn granted(&self, actor: &Actor, project: ProjectRef, permission: ProjectPermission) -> bool {
		self.grants.contains(&(actor.id, project, permission))
	}
}

impl EntityDirectory for FakeCatalog {
	fn find_tracker(
		&self,
		_actor: &Actor,
		id: TrackerRef,
	) -> BoxFuture<'_, Result<Option<Tracker>>> {
		ready(Ok(self.lookup(id))).boxed()
	}

	fn find_branches(
		&self,
		_actor: &Actor,
		origin: TrackerRef,
	) -> BoxFuture<'_, Result<Vec<Tracker>>> {
		let branches = self
			.trackers
			.iter()
			.filter(|tracker| tracker.origin == Some(origin))
			.cloned()
			.collect();
		ready(Ok(branches)).boxed()
	}
}

impl PermissionService for FakeCatalog {
	fn is_project_admin(&self, actor: &Actor, project: ProjectRef) -> BoxFuture<'_, Result<bool>> {
		ready(Ok(self.granted(actor, project, ProjectPermission::Admin))).boxed()
	}

	fn has_permission(
		&self,
		actor: &Actor,
		project: ProjectRef,
		permission: ProjectPermission,
	) -> BoxFuture<'_, Result<bool>> {
		ready(Ok(self.granted(actor, project, permission))).boxed()
	}
}

impl ReferenceIndex for FakeCatalog {
	fn incoming_reference_fields<'a>(
		&'a self,
		_actor: &'a Actor,
		tracker: &'a Tracker,
		filter: FieldFilter<'a>,
	) -> BoxFuture<'a, Result<Vec<(Tracker, ReferenceField)>>> {
		let matches = self
			.fields
			.iter()
			.filter(|(field, targets)| targets.contains(&tracker.id) && filter(field))
			.filter_map(|(field, _)| Some((self.lookup(field.tracker)?, field.clone())))
			.collect();
		ready(Ok(matches)).boxed()
	}
}

#[derive(Debug)]
pub struct FakeLicense(pub bool);

impl LicenseGate for FakeLicense {
	fn has_branching_license(&self) -> bool {
		self.0
	}
}

/// Submitter remembering every batch it receives.
#[derive(Debug, Default)]
pub struct RecordingSubmitter {
	batches: Mutex<Vec<(Actor, Vec<CreationParameters>, bool)>>,
}

impl RecordingSubmitter {
	pub fn batches(&self) -> Vec<(Actor, Vec<CreationParameters>, bool)> {
		self.batches.lock().unwrap().clone()
	}
}

impl BranchJobSubmitter for RecordingSubmitter {
	fn submit(
		&self,
		actor: &Actor,
		branches: Vec<CreationParameters>,
		dry_run: bool,
	) -> BoxFuture<'_, Result<JobRef>> {
		self.batches
			.lock()
			.unwrap()
			.push((actor.to_owned(), branches, dry_run));
		ready(Ok(Uuid::now_v7())).boxed()
	}
}
