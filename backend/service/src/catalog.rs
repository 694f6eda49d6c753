//! SQL-backed tracker catalog.

use std::sync::Arc;

use diesel::{dsl, insert_into, prelude::*};
use futures::{FutureExt, future::BoxFuture};
use kstring::KString;
use ramify_backend_model::{
	actor::{AccountRef, Actor},
	db::{
		BoxedSqlConn,
		schema::{account, project, project_permission, reference_field, reference_field_target, tracker},
	},
	job::CreationParameters,
	tracker::{
		FieldRef, ProjectPermission, ProjectRef, ReferenceField, Tracker, TrackerKind, TrackerRef,
	},
};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::{
	Result,
	database::DatabaseService,
	directory::{EntityDirectory, FieldFilter, PermissionService, ReferenceIndex},
};

type TrackerRow = (TrackerRef, ProjectRef, String, String, i16, Option<TrackerRef>);

const TRACKER_COLUMNS: (
	tracker::id,
	tracker::project_id,
	tracker::name,
	tracker::key_name,
	tracker::kind,
	tracker::origin_id,
) = (
	tracker::id,
	tracker::project_id,
	tracker::name,
	tracker::key_name,
	tracker::kind,
	tracker::origin_id,
);

type VisibleProjects = dsl::Select<
	dsl::Filter<project_permission::table, dsl::Eq<project_permission::account_id, AccountRef>>,
	project_permission::project_id,
>;

/// Projects in which `account` holds any permission.
fn visible_projects(account: AccountRef) -> VisibleProjects {
	project_permission::table
		.filter(project_permission::account_id.eq(account))
		.select(project_permission::project_id)
}

fn to_tracker((id, project, name, key_name, kind, origin): TrackerRow) -> Tracker {
	Tracker {
		id,
		project,
		name,
		key_name,
		kind: TrackerKind::from(kind),
		origin,
	}
}

/// Hex-encoded SHA-256 digest of an API token, as stored for accounts.
pub fn token_digest(token: &str) -> String {
	hex::encode(Sha256::digest(token.as_bytes()))
}

/// Trackers, projects, accounts and reference fields stored in the database.
#[derive(Debug)]
pub struct Catalog {
	db: Arc<DatabaseService>,
}

impl Catalog {
	pub fn new(db: Arc<DatabaseService>) -> Self {
		Self { db }
	}

	/// Finds the account owning `token`.
	pub async fn authenticate(&self, token: &str) -> Result<Option<Actor>> {
		let mut conn = self.db.get().await?;
		let account = conn
			.get_result::<_, (AccountRef, String)>(
				account::table
					.filter(account::token_digest.eq(token_digest(token)))
					.select((account::id, account::name)),
			)
			.await
			.optional()?;
		Ok(account.map(|(id, name)| Actor {
			id,
			name: KString::from_string(name),
		}))
	}

	pub async fn create_account(&self, name: &str, token: &str) -> Result<AccountRef> {
		let mut conn = self.db.get().await?;
		let id = conn
			.get_result::<_, AccountRef>(
				insert_into(account::table)
					.values((
						account::name.eq(name),
						account::token_digest.eq(token_digest(token)),
					))
					.returning(account::id),
			)
			.await?;
		info!(account = id, name, "created account");
		Ok(id)
	}

	pub async fn create_project(&self, name: &str) -> Result<ProjectRef> {
		let mut conn = self.db.get().await?;
		let id = conn
			.get_result::<_, ProjectRef>(
				insert_into(project::table)
					.values(project::name.eq(name))
					.returning(project::id),
			)
			.await?;
		info!(project = id, name, "created project");
		Ok(id)
	}

	pub async fn grant(
		&self,
		project: ProjectRef,
		account: AccountRef,
		permission: ProjectPermission,
	) -> Result<()> {
		let mut conn = self.db.get().await?;
		conn.execute(insert_into(project_permission::table).values((
			project_permission::project_id.eq(project),
			project_permission::account_id.eq(account),
			project_permission::permission.eq(permission.as_key()),
		)))
		.await?;
		info!(project, account, permission = permission.as_key(), "granted permission");
		Ok(())
	}

	pub async fn create_tracker(
		&self,
		project: ProjectRef,
		name: &str,
		key_name: &str,
		kind: TrackerKind,
	) -> Result<TrackerRef> {
		let mut conn = self.db.get().await?;
		let id = conn
			.get_result::<_, TrackerRef>(
				insert_into(tracker::table)
					.values((
						tracker::project_id.eq(project),
						tracker::name.eq(name),
						tracker::key_name.eq(key_name),
						tracker::kind.eq(kind as u8 as i16),
					))
					.returning(tracker::id),
			)
			.await?;
		info!(tracker = id, project, key_name, %kind, "created tracker");
		Ok(id)
	}

	pub async fn create_reference_field(
		&self,
		tracker: TrackerRef,
		label: &str,
		targets: &[TrackerRef],
	) -> Result<FieldRef> {
		let mut conn = self.db.get().await?;
		self.insert_reference_field(&mut conn, tracker, label, targets)
			.await
	}

	/// Inserts the tracker row of a new branch.
	pub async fn insert_branch(
		&self,
		conn: &mut BoxedSqlConn,
		params: &CreationParameters,
	) -> Result<TrackerRef> {
		let branch = &params.branch;
		let id = conn
			.get_result::<_, TrackerRef>(
				insert_into(tracker::table)
					.values((
						tracker::project_id.eq(branch.project),
						tracker::name.eq(&branch.name),
						tracker::key_name.eq(&branch.key_name),
						tracker::kind.eq(params.source.kind as u8 as i16),
						tracker::origin_id.eq(branch.origin),
						tracker::baseline_id.eq(params.baseline),
						tracker::color.eq(branch.color.as_deref()),
						tracker::description.eq(branch.description.as_deref()),
						tracker::inheritance.eq(params.inheritance.as_key()),
					))
					.returning(tracker::id),
			)
			.await?;
		debug!(tracker = id, origin = branch.origin, "inserted branch tracker");
		Ok(id)
	}

	/// Lists the reference fields of `tracker` with their targets, ordered by field id.
	pub async fn reference_fields_of(
		&self,
		conn: &mut BoxedSqlConn,
		tracker: TrackerRef,
	) -> Result<Vec<(ReferenceField, Vec<TrackerRef>)>> {
		let fields = conn
			.load::<_, (FieldRef, TrackerRef, String)>(
				reference_field::table
					.filter(reference_field::tracker_id.eq(tracker))
					.order(reference_field::id.asc())
					.select((
						reference_field::id,
						reference_field::tracker_id,
						reference_field::label,
					)),
			)
			.await?;
		let ids = fields.iter().map(|(id, _, _)| *id).collect::<Vec<_>>();
		let targets = conn
			.load::<_, (FieldRef, TrackerRef)>(
				reference_field_target::table
					.filter(reference_field_target::field_id.eq_any(ids))
					.order((
						reference_field_target::field_id.asc(),
						reference_field_target::target_id.asc(),
					))
					.select((
						reference_field_target::field_id,
						reference_field_target::target_id,
					)),
			)
			.await?;

		Ok(fields
			.into_iter()
			.map(|(id, tracker, label)| {
				let field_targets = targets
					.iter()
					.filter(|(field, _)| *field == id)
					.map(|(_, target)| *target)
					.collect();
				(ReferenceField { id, tracker, label }, field_targets)
			})
			.collect())
	}

	pub async fn insert_reference_field(
		&self,
		conn: &mut BoxedSqlConn,
		tracker: TrackerRef,
		label: &str,
		targets: &[TrackerRef],
	) -> Result<FieldRef> {
		let id = conn
			.get_result::<_, FieldRef>(
				insert_into(reference_field::table)
					.values((
						reference_field::tracker_id.eq(tracker),
						reference_field::label.eq(label),
					))
					.returning(reference_field::id),
			)
			.await?;
		for target in targets {
			conn.execute(insert_into(reference_field_target::table).values((
				reference_field_target::field_id.eq(id),
				reference_field_target::target_id.eq(*target),
			)))
			.await?;
		}
		debug!(field = id, tracker, label, ?targets, "inserted reference field");
		Ok(id)
	}

	async fn count_permissions(
		&self,
		account: AccountRef,
		project: ProjectRef,
		permission: ProjectPermission,
	) -> Result<i64> {
		let mut conn = self.db.get().await?;
		Ok(conn
			.get_result::<_, i64>(
				project_permission::table
					.filter(project_permission::project_id.eq(project))
					.filter(project_permission::account_id.eq(account))
					.filter(project_permission::permission.eq(permission.as_key()))
					.count(),
			)
			.await?)
	}
}

impl EntityDirectory for Catalog {
	fn find_tracker(
		&self,
		actor: &Actor,
		id: TrackerRef,
	) -> BoxFuture<'_, Result<Option<Tracker>>> {
		let account = actor.id;
		async move {
			let mut conn = self.db.get().await?;
			let row = conn
				.get_result::<_, TrackerRow>(
					tracker::table
						.filter(tracker::id.eq(id))
						.filter(tracker::project_id.eq_any(visible_projects(account)))
						.select(TRACKER_COLUMNS),
				)
				.await
				.optional()?;
			Ok(row.map(to_tracker))
		}
		.boxed()
	}

	fn find_branches(
		&self,
		actor: &Actor,
		origin: TrackerRef,
	) -> BoxFuture<'_, Result<Vec<Tracker>>> {
		let account = actor.id;
		async move {
			let mut conn = self.db.get().await?;
			let rows = conn
				.load::<_, TrackerRow>(
					tracker::table
						.filter(tracker::origin_id.eq(origin))
						.filter(tracker::project_id.eq_any(visible_projects(account)))
						.order(tracker::id.asc())
						.select(TRACKER_COLUMNS),
				)
				.await?;
			Ok(rows.into_iter().map(to_tracker).collect())
		}
		.boxed()
	}
}

impl PermissionService for Catalog {
	fn is_project_admin(&self, actor: &Actor, project: ProjectRef) -> BoxFuture<'_, Result<bool>> {
		let account = actor.id;
		async move {
			Ok(self
				.count_permissions(account, project, ProjectPermission::Admin)
				.await? > 0)
		}
		.boxed()
	}

	fn has_permission(
		&self,
		actor: &Actor,
		project: ProjectRef,
		permission: ProjectPermission,
	) -> BoxFuture<'_, Result<bool>> {
		let account = actor.id;
		async move { Ok(self.count_permissions(account, project, permission).await? > 0) }.boxed()
	}
}

impl ReferenceIndex for Catalog {
	fn incoming_reference_fields<'a>(
		&'a self,
		actor: &'a Actor,
		target: &'a Tracker,
		filter: FieldFilter<'a>,
	) -> BoxFuture<'a, Result<Vec<(Tracker, ReferenceField)>>> {
		async move {
			let mut conn = self.db.get().await?;
			let rows = conn
				.load::<_, (TrackerRow, (FieldRef, TrackerRef, String))>(
					reference_field_target::table
						.inner_join(reference_field::table.inner_join(tracker::table))
						.filter(reference_field_target::target_id.eq(target.id))
						.filter(tracker::project_id.eq_any(visible_projects(actor.id)))
						.order(reference_field::id.asc())
						.select((
							TRACKER_COLUMNS,
							(
								reference_field::id,
								reference_field::tracker_id,
								reference_field::label,
							),
						)),
				)
				.await?;
			Ok(rows
				.into_iter()
				.map(|(owner, (id, tracker, label))| {
					(to_tracker(owner), ReferenceField { id, tracker, label })
				})
				.filter(|(_, field)| filter(field))
				.collect())
		}
		.boxed()
	}
}

#[cfg(test)]
pub(crate) mod test {
	use ramify_backend_model::{
		branch::Branch,
		job::BranchReferenceModel,
		rewrite::RewriteMap,
	};
	use ramify_common_model::branch::PermissionInheritance;

	use super::*;
	use crate::test::test_env;

	pub struct Seed {
		pub alice: Actor,
		pub bob: Actor,
		pub project: ProjectRef,
		pub requirements: TrackerRef,
		pub tests: TrackerRef,
		pub releases: TrackerRef,
		/// Field of `tests` pointing at `requirements`.
		pub verifies: FieldRef,
	}

	/// Seeds a project administrated by alice, which bob cannot see.
	pub async fn seed(catalog: &Catalog) -> Seed {
		let alice = catalog.create_account("alice", "alice-token").await.unwrap();
		let bob = catalog.create_account("bob", "bob-token").await.unwrap();
		let project = catalog.create_project("Product").await.unwrap();
		catalog
			.grant(project, alice, ProjectPermission::Admin)
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
		let releases = catalog
			.create_tracker(project, "Releases", "REL", TrackerKind::Release)
			.await
			.unwrap();
		let verifies = catalog
			.create_reference_field(tests, "Verifies", &[requirements])
			.await
			.unwrap();
		Seed {
			alice: Actor {
				id: alice,
				name: KString::from_static("alice"),
			},
			bob: Actor {
				id: bob,
				name: KString::from_static("bob"),
			},
			project,
			requirements,
			tests,
			releases,
			verifies,
		}
	}

	#[tokio::test]
	async fn test_authenticate() {
		let env = test_env().await;
		let seed = seed(&env.catalog).await;
		assert_eq!(
			env.catalog.authenticate("alice-token").await.unwrap(),
			Some(seed.alice)
		);
		assert_eq!(env.catalog.authenticate("nobody").await.unwrap(), None);
	}

	#[test]
	fn test_token_digest() {
		assert_eq!(
			token_digest("abc"),
			"ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
		);
	}

	#[tokio::test]
	async fn test_visibility() {
		let env = test_env().await;
		let seed = seed(&env.catalog).await;

		let tracker = env
			.catalog
			.find_tracker(&seed.alice, seed.requirements)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(tracker.key_name, "REQ");
		assert_eq!(tracker.kind, TrackerKind::Requirement);
		assert_eq!(tracker.origin, None);

		assert!(
			env.catalog
				.find_tracker(&seed.bob, seed.requirements)
				.await
				.unwrap()
				.is_none()
		);
		assert!(
			env.catalog
				.find_tracker(&seed.alice, 9999)
				.await
				.unwrap()
				.is_none()
		);
	}

	#[tokio::test]
	async fn test_permissions() {
		let env = test_env().await;
		let seed = seed(&env.catalog).await;
		let catalog = &env.catalog;

		assert!(catalog.is_project_admin(&seed.alice, seed.project).await.unwrap());
		assert!(!catalog.is_project_admin(&seed.bob, seed.project).await.unwrap());

		catalog
			.grant(seed.project, seed.bob.id, ProjectPermission::BranchAdmin)
			.await
			.unwrap();
		assert!(
			catalog
				.has_permission(&seed.bob, seed.project, ProjectPermission::BranchAdmin)
				.await
				.unwrap()
		);
		assert!(!catalog.is_project_admin(&seed.bob, seed.project).await.unwrap());
	}

	#[tokio::test]
	async fn test_incoming_references() {
		let env = test_env().await;
		let seed = seed(&env.catalog).await;
		let catalog = &env.catalog;
		let requirements = catalog
			.find_tracker(&seed.alice, seed.requirements)
			.await
			.unwrap()
			.unwrap();

		let all = catalog
			.incoming_reference_fields(&seed.alice, &requirements, &|_| true)
			.await
			.unwrap();
		assert_eq!(all.len(), 1);
		assert_eq!(all[0].0.id, seed.tests);
		assert_eq!(all[0].1.id, seed.verifies);
		assert_eq!(all[0].1.label, "Verifies");

		let none = catalog
			.incoming_reference_fields(&seed.alice, &requirements, &|field| {
				field.tracker == seed.releases
			})
			.await
			.unwrap();
		assert!(none.is_empty());

		let invisible = catalog
			.incoming_reference_fields(&seed.bob, &requirements, &|_| true)
			.await
			.unwrap();
		assert!(invisible.is_empty());
	}

	#[tokio::test]
	async fn test_insert_branch() {
		let env = test_env().await;
		let seed = seed(&env.catalog).await;
		let catalog = &env.catalog;
		let source = catalog
			.find_tracker(&seed.alice, seed.tests)
			.await
			.unwrap()
			.unwrap();
		let params = CreationParameters {
			branch: Branch {
				name: "1.2".to_string(),
				key_name: "TC » 1.2".to_string(),
				color: Some("#ffab46".to_string()),
				description: None,
				project: source.project,
				origin: source.id,
			},
			source,
			baseline: None,
			inheritance: PermissionInheritance::Copy,
			references: BranchReferenceModel::replacing(RewriteMap::new()),
		};

		let mut conn = env.database.get().await.unwrap();
		let id = catalog.insert_branch(&mut conn, &params).await.unwrap();
		let fields = catalog.reference_fields_of(&mut conn, seed.tests).await.unwrap();
		drop(conn);

		assert_eq!(fields.len(), 1);
		assert_eq!(fields[0].1, vec![seed.requirements]);

		let branches = catalog.find_branches(&seed.alice, seed.tests).await.unwrap();
		assert_eq!(branches.len(), 1);
		assert_eq!(branches[0].id, id);
		assert_eq!(branches[0].origin, Some(seed.tests));
		assert_eq!(branches[0].kind, TrackerKind::TestCase);
		assert!(catalog.find_branches(&seed.bob, seed.tests).await.unwrap().is_empty());
	}
}
