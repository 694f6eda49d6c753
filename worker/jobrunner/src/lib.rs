//! Job runner of Ramify workers.

use std::sync::Arc;

use anyhow::Result;
use ramify_backend_model::{
	bus::{BackendBusMessage, LockKey},
	db::BoxedSqlConn,
	job::{BranchReferenceModel, CreateBranchesJob, Job, JobCommand, JobRef},
	tracker::{ReferenceField, TrackerRef},
};
use ramify_backend_service::{BackendError, BackendServices};
use time::Duration;
use tokio::sync::Notify;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Interval between two scans for pending jobs.
const WATCH_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3 * 60);

#[derive(Debug)]
pub struct JobRunner {
	/// Notifier to resume the runner immediately.
	notifier: Notify,
	/// Backend services
	backend: Arc<BackendServices>,
}

impl JobRunner {
	pub fn new(backend: Arc<BackendServices>) -> Result<Self> {
		Ok(Self {
			notifier: Notify::const_new(),
			backend,
		})
	}

	#[tracing::instrument(level = "info", name = "jobrunner", skip(self))]
	pub async fn run(self: Arc<Self>, index: usize) {
		info!("job runner started");
		loop {
			self.notifier.notified().await;
			debug!("notified to resume");

			if let Err(error) = self.drain().await {
				error!(?error, "job runner error")
			}
		}
	}

	/// Runs pending jobs until the queue is empty.
	pub async fn drain(&self) -> Result<()> {
		while let Some(job) = self.backend.job_queue.fetch_and_start().await? {
			let result = self
				.exec(&job)
				.instrument(info_span!("execute job", job = %job.id))
				.await;
			// failed jobs are not retried
			if let Err(error) = result {
				error!(job = %job.id, ?error, "job failed");
			}
			let mut db = self.backend.database.get().await?;
			self.backend.job_queue.finish_job(&mut db, job.id).await?;
		}
		Ok(())
	}

	#[tracing::instrument(level = "debug", name = "job_watcher", skip(self))]
	pub async fn run_watcher(self: Arc<Self>, runners: usize) {
		info!("job watcher started");
		loop {
			let result = async {
				let count = self
					.backend
					.job_queue
					.count_pending(runners as i64)
					.await?;
				for _ in 0..count {
					self.notify_one();
				}

				Ok::<_, anyhow::Error>(())
			}
			.await;
			if let Err(error) = result {
				error!(?error, "job watcher error")
			}
			tokio::time::sleep(WATCH_INTERVAL).await;
		}
	}

	pub fn notify_one(&self) {
		self.notifier.notify_one();
	}

	pub fn notify_all(&self) {
		self.notifier.notify_waiters();
	}

	/// Runs a job command.
	pub async fn exec(&self, job: &Job) -> Result<()> {
		match &job.command {
			JobCommand::CreateBranches(batch) => self.create_branches(job.id, batch).await?,
		}
		Ok(())
	}

	async fn create_branches(&self, job: JobRef, batch: &CreateBranchesJob) -> Result<()> {
		if batch.dry_run {
			for params in &batch.branches {
				info!(
					source = params.source.id,
					key_name = %params.branch.key_name,
					rewrites = params.references.rewrites.len(),
					"dry run, branch not created"
				);
			}
			return Ok(());
		}

		// sources are locked in ascending order
		let mut locks = Vec::new();
		if let Some(redis) = &self.backend.redis {
			let mut sources = batch
				.branches
				.iter()
				.map(|params| params.source.id)
				.collect::<Vec<_>>();
			sources.sort_unstable();
			sources.dedup();
			for source in sources {
				locks.push(
					redis
						.lock(LockKey::Tracker(source), Duration::minutes(5))
						.await?,
				);
			}
		}

		let mut db = self.backend.database.get().await?;
		let created = db
			.transaction(async |conn| self.materialize(conn, batch).await)
			.await?;
		drop(db);
		drop(locks);

		let trackers = created.iter().map(|(_, branch)| *branch).collect::<Vec<_>>();
		info!(actor = batch.actor.id, ?trackers, "created branches");
		if let Err(error) = self
			.backend
			.bus
			.broadcast(BackendBusMessage::BranchesCreated { job, trackers })
			.await
		{
			warn!(%error, "failed to broadcast created branches");
		}
		Ok(())
	}

	/// Inserts the branches of a batch and copies the reference fields of their sources.
	///
	/// Returns pairs of source tracker and created branch, in batch order.
	async fn materialize(
		&self,
		conn: &mut BoxedSqlConn,
		batch: &CreateBranchesJob,
	) -> Result<Vec<(TrackerRef, TrackerRef)>, BackendError> {
		let catalog = &self.backend.catalog;
		let mut created = Vec::with_capacity(batch.branches.len());
		for params in &batch.branches {
			let branch = catalog.insert_branch(conn, params).await?;
			created.push((params.source.id, branch));
		}

		for (params, (_, branch)) in batch.branches.iter().zip(&created) {
			let fields = catalog.reference_fields_of(conn, params.source.id).await?;
			for (field, targets) in fields {
				let targets = retarget(&field, &targets, &params.references, &created);
				catalog
					.insert_reference_field(conn, *branch, &field.label, &targets)
					.await?;
			}
		}
		Ok(created)
	}
}

/// Computes the targets of a copied reference field.
///
/// Targets replaced by a branch of the same batch are redirected to the
/// created branch. Other targets are kept.
pub fn retarget(
	field: &ReferenceField,
	targets: &[TrackerRef],
	references: &BranchReferenceModel,
	created: &[(TrackerRef, TrackerRef)],
) -> Vec<TrackerRef> {
	let replacements = match references.rewrites.get(field.id) {
		Some(branches) if references.replace_incoming_references => branches,
		_ => return targets.to_vec(),
	};
	let mut result = Vec::with_capacity(targets.len());
	for target in targets {
		let replaced = replacements
			.iter()
			.filter(|branch| branch.origin == *target)
			.find_map(|branch| {
				created
					.iter()
					.find(|(source, _)| *source == branch.origin)
					.map(|(_, created)| *created)
			})
			.unwrap_or(*target);
		if !result.contains(&replaced) {
			result.push(replaced);
		}
	}
	result
}

#[cfg(test)]
mod test {
	use ramify_backend_model::{
		actor::Actor,
		branch::{Branch, BranchRequest},
		rewrite::RewriteMap,
		tracker::{ProjectPermission, TrackerKind},
	};
	use ramify_backend_service::{
		bus::DetachedBusFactory, config::BackendConfig, database::DatabaseConfig,
		directory::{BranchJobSubmitter, EntityDirectory},
	};
	use ramify_common_model::branch::PermissionInheritance;

	use super::*;

	async fn test_env() -> Arc<BackendServices> {
		let config = BackendConfig {
			database: DatabaseConfig {
				url: "sqlite://:memory:".to_string(),
				max_connections: 1,
			},
			redis: None,
			license: serde_json::from_value(serde_json::json!({ "features": ["branching"] }))
				.unwrap(),
		};
		Arc::new(BackendServices::new(config, DetachedBusFactory).await.unwrap())
	}

	struct Seed {
		actor: Actor,
		requirements: TrackerRef,
		tests: TrackerRef,
		tasks: TrackerRef,
	}

	/// Test cases verify requirements and tasks, requirements are tested by test cases.
	async fn seed(backend: &BackendServices) -> Seed {
		let catalog = &backend.catalog;
		let account = catalog.create_account("alice", "token").await.unwrap();
		let project = catalog.create_project("Product").await.unwrap();
		catalog
			.grant(project, account, ProjectPermission::Admin)
			.await
			.unwrap();
		let requirements = catalog
			.create_tracker(project, "Requirements", "REQ", TrackerKind::Requirement)
			.await
			.unwrap();
		let tests = catalog
			.create_tracker(project, "Test Cases", "TC", TrackerKind::TestCase)
			.await
			.unwrap();
		let tasks = catalog
			.create_tracker(project, "Tasks", "TSK", TrackerKind::Task)
			.await
			.unwrap();
		catalog
			.create_reference_field(tests, "Verifies", &[requirements, tasks])
			.await
			.unwrap();
		catalog
			.create_reference_field(requirements, "Tested by", &[tests])
			.await
			.unwrap();
		Seed {
			actor: catalog.authenticate("token").await.unwrap().unwrap(),
			requirements,
			tests,
			tasks,
		}
	}

	fn request(source: TrackerRef) -> BranchRequest {
		BranchRequest {
			source,
			baseline: None,
			name: "1.2".to_string(),
			key_name: None,
			color: None,
			description: Some("maintenance branch".to_string()),
			inheritance: PermissionInheritance::Copy,
		}
	}

	async fn run_batch(backend: &Arc<BackendServices>, seed: &Seed, dry_run: bool) {
		let params = backend
			.branching
			.prepare(&seed.actor, &[request(seed.requirements), request(seed.tests)])
			.await
			.unwrap();
		backend
			.job_queue
			.submit(&seed.actor, params, dry_run)
			.await
			.unwrap();
		let runner = JobRunner::new(backend.clone()).unwrap();
		runner.drain().await.unwrap();
		assert_eq!(backend.job_queue.count_all().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn test_create_branches() {
		let backend = test_env().await;
		let seed = seed(&backend).await;
		run_batch(&backend, &seed, false).await;

		let catalog = &backend.catalog;
		let req_branches = catalog
			.find_branches(&seed.actor, seed.requirements)
			.await
			.unwrap();
		let tc_branches = catalog.find_branches(&seed.actor, seed.tests).await.unwrap();
		assert_eq!(req_branches.len(), 1);
		assert_eq!(tc_branches.len(), 1);
		assert_eq!(req_branches[0].key_name, "REQ » 1.2");
		let (req_branch, tc_branch) = (req_branches[0].id, tc_branches[0].id);

		let mut db = backend.database.get().await.unwrap();
		let tc_fields = catalog.reference_fields_of(&mut db, tc_branch).await.unwrap();
		assert_eq!(tc_fields.len(), 1);
		assert_eq!(tc_fields[0].0.label, "Verifies");
		let mut targets = tc_fields[0].1.clone();
		targets.sort_unstable();
		let mut expected = vec![req_branch, seed.tasks];
		expected.sort_unstable();
		assert_eq!(targets, expected);

		let req_fields = catalog.reference_fields_of(&mut db, req_branch).await.unwrap();
		assert_eq!(req_fields[0].1, vec![tc_branch]);

		// sources are left untouched
		let source_fields = catalog
			.reference_fields_of(&mut db, seed.tests)
			.await
			.unwrap();
		assert_eq!(source_fields[0].1.len(), 2);
		assert!(source_fields[0].1.contains(&seed.requirements));
	}

	#[tokio::test]
	async fn test_dry_run() {
		let backend = test_env().await;
		let seed = seed(&backend).await;
		run_batch(&backend, &seed, true).await;

		let branches = backend
			.catalog
			.find_branches(&seed.actor, seed.requirements)
			.await
			.unwrap();
		assert!(branches.is_empty());
	}

	#[test]
	fn test_retarget() {
		let field = ReferenceField {
			id: 100,
			tracker: 2,
			label: "Verifies".to_string(),
		};
		let branch = Branch {
			name: "1.2".to_string(),
			key_name: "REQ » 1.2".to_string(),
			color: None,
			description: None,
			project: 1,
			origin: 1,
		};
		let mut rewrites = RewriteMap::new();
		rewrites.push(&field, branch);
		let created = [(1, 11), (2, 12)];

		let references = BranchReferenceModel::replacing(rewrites.clone());
		assert_eq!(retarget(&field, &[1, 3], &references, &created), vec![11, 3]);

		let unrelated = ReferenceField { id: 101, ..field.clone() };
		assert_eq!(retarget(&unrelated, &[1, 3], &references, &created), vec![1, 3]);

		let kept = BranchReferenceModel {
			replace_incoming_references: false,
			rewrites,
		};
		assert_eq!(retarget(&field, &[1], &kept, &created), vec![1]);
	}
}
