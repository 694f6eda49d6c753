use std::sync::Arc;

use diesel::{delete, dsl::count_star, insert_into, prelude::*, update};
use futures::{FutureExt, future::BoxFuture};
use ramify_backend_model::{
	actor::Actor,
	bus::RunnerBusMessage,
	db::{
		BoxedSqlConn,
		schema::job_queue::dsl,
		utils::{XJsonVal, XUuidVal},
	},
	job::{CreateBranchesJob, CreationParameters, Job, JobCommand, JobRef},
};
use thiserror::Error;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
	Result, bus::BackendBusService, database::DatabaseService, directory::BranchJobSubmitter,
};

/// Default job priority. Higher priorities are polled first.
pub const DEFAULT_PRIORITY: u16 = 100;

/// Lightweight job queue stored in the SQL database.
#[derive(Debug)]
pub struct JobQueue {
	db: Arc<DatabaseService>,
	bus: Arc<dyn BackendBusService>,
}

impl JobQueue {
	pub fn new(db: Arc<DatabaseService>, bus: Arc<dyn BackendBusService>) -> Self {
		Self { db, bus }
	}

	pub async fn enqueue(&self, conn: &mut BoxedSqlConn, job: JobCommand) -> Result<JobRef> {
		self.enqueue_with_priority(conn, job, DEFAULT_PRIORITY)
			.await
	}

	pub async fn enqueue_with_priority(
		&self,
		conn: &mut BoxedSqlConn,
		job: JobCommand,
		priority: u16,
	) -> Result<JobRef> {
		let id = Uuid::now_v7();
		let (kind, job_data) = job.serialize()?;

		let id = conn
			.get_result::<_, XUuidVal>(
				insert_into(dsl::job_queue)
					.values((
						dsl::id.eq(XUuidVal(id)),
						dsl::kind.eq(kind.as_str()),
						dsl::data.eq(XJsonVal(job_data)),
						dsl::priority.eq(priority as i16),
					))
					.returning(dsl::id),
			)
			.await?;
		let id = id.0;
		info!(%kind, %id, "enqueued job");

		Ok(id)
	}

	pub async fn fetch_and_start(&self) -> Result<Option<Job>> {
		let mut conn = self.db.get().await?;

		loop {
			let time = OffsetDateTime::now_utc();
			let time = PrimitiveDateTime::new(time.date(), time.time());

			// find a pending job
			// for jobs with the same priority, we order them with ID.
			// because ID are UUID v7, this is equivalent to ordering with
			// insertion time
			let result = conn
				.get_result::<_, (XUuidVal, String, XJsonVal)>(
					dsl::job_queue
						.limit(1)
						.filter(dsl::started_at.is_null())
						.order((dsl::priority.desc(), dsl::id.asc()))
						.select((dsl::id, dsl::kind, dsl::data)),
				)
				.await
				.optional()?;
			let Some((id, kind, data)) = result else {
				return Ok(None);
			};
			let cols = conn
				.execute(
					update(dsl::job_queue)
						.filter(dsl::id.eq(id).and(dsl::started_at.is_null()))
						.set(dsl::started_at.eq(time)),
				)
				.await?;
			#[cfg(test)]
			assert!(cols != 0);
			if cols == 0 {
				warn!(%id, "SQL lightweight job queue polling hit contention");
				continue;
			}
			info!(%id, %kind, "polled lightweight job");
			let command = JobCommand::deserialize(&kind, data.0)?;
			return Ok(Some(Job { id: id.0, command }));
		}
	}

	pub async fn finish_job(&self, conn: &mut BoxedSqlConn, id: JobRef) -> Result<()> {
		let cols = conn
			.execute(
				delete(dsl::job_queue)
					.filter(dsl::id.eq(XUuidVal(id)).and(dsl::started_at.is_not_null())),
			)
			.await?;
		if cols == 0 {
			warn!(%id, "job has been aborted or finished by another worker");
			return Err(JobQueueError::JobAborted(id).into());
		}
		Ok(())
	}

	/// Counts pending jobs, up to `limit`.
	pub async fn count_pending(&self, limit: i64) -> Result<i64> {
		let mut conn = self.db.get().await?;
		let ids = conn
			.load::<_, XUuidVal>(
				dsl::job_queue
					.filter(dsl::started_at.is_null())
					.select(dsl::id)
					.limit(limit),
			)
			.await?;
		Ok(ids.len() as i64)
	}

	/// Counts all queued jobs, started or not.
	pub async fn count_all(&self) -> Result<i64> {
		let mut conn = self.db.get().await?;
		Ok(conn
			.get_result::<_, i64>(dsl::job_queue.select(count_star()))
			.await?)
	}
}

impl BranchJobSubmitter for JobQueue {
	fn submit(
		&self,
		actor: &Actor,
		branches: Vec<CreationParameters>,
		dry_run: bool,
	) -> BoxFuture<'_, Result<JobRef>> {
		let command = JobCommand::CreateBranches(CreateBranchesJob {
			actor: actor.to_owned(),
			branches,
			dry_run,
		});
		async move {
			let mut conn = self.db.get().await?;
			let id = self.enqueue(&mut conn, command).await?;
			drop(conn);

			// runners also poll periodically, a lost wake-up only delays the job
			if let Err(error) = self.bus.send_to_runner(RunnerBusMessage::ResumeJobRunner).await {
				warn!(job = %id, %error, "failed to wake up job runners");
			}
			Ok(id)
		}
		.boxed()
	}
}

#[derive(Debug, Error)]
pub enum JobQueueError {
	#[error("job {0} has been aborted")]
	JobAborted(JobRef),
}

#[cfg(test)]
mod test {
	use diesel::QueryDsl;
	use kstring::KString;
	use ramify_backend_model::{db::schema::job_queue::dsl, job::CreateBranchesJob};

	use super::*;
	use crate::test::test_env;

	fn command(dry_run: bool) -> JobCommand {
		JobCommand::CreateBranches(CreateBranchesJob {
			actor: actor(),
			branches: Vec::new(),
			dry_run,
		})
	}

	fn actor() -> Actor {
		Actor {
			id: 1,
			name: KString::from_static("alice"),
		}
	}

	#[tokio::test]
	async fn test_enqueue() {
		let env = test_env().await;
		let mut db = env.database.get().await.unwrap();
		let id = env.job_queue.enqueue(&mut db, command(false)).await.unwrap();
		assert_eq!(id.get_version_num(), 7);
	}

	#[tokio::test]
	async fn test_enqueue_fetch() {
		let env = test_env().await;
		let mut db = env.database.get().await.unwrap();
		let jq = env.job_queue;
		let first = jq.enqueue(&mut db, command(false)).await.unwrap();
		let urgent = jq
			.enqueue_with_priority(&mut db, command(true), 120)
			.await
			.unwrap();
		let last = jq.enqueue(&mut db, command(false)).await.unwrap();
		drop(db);
		assert_eq!(jq.count_pending(10).await.unwrap(), 3);

		let job = jq.fetch_and_start().await.unwrap().unwrap();
		assert_eq!(job.id, urgent);
		assert_eq!(job.command, command(true));
		assert_eq!(jq.fetch_and_start().await.unwrap().unwrap().id, first);
		assert_eq!(jq.fetch_and_start().await.unwrap().unwrap().id, last);
		assert!(jq.fetch_and_start().await.unwrap().is_none());
		assert_eq!(jq.count_pending(10).await.unwrap(), 0);
		assert_eq!(jq.count_all().await.unwrap(), 3);
	}

	#[tokio::test]
	async fn test_finish() {
		let env = test_env().await;
		let jq = env.job_queue;

		let mut db = env.database.get().await.unwrap();
		jq.enqueue(&mut db, command(false)).await.unwrap();
		drop(db);

		let id = jq.fetch_and_start().await.unwrap().unwrap().id;

		let mut db = env.database.get().await.unwrap();
		jq.finish_job(&mut db, id).await.unwrap();
		assert_eq!(
			db.get_result::<_, i64>(dsl::job_queue.count())
				.await
				.unwrap(),
			0
		);
		assert!(jq.finish_job(&mut db, id).await.is_err());
		drop(db);

		assert!(jq.fetch_and_start().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_submit() {
		let env = test_env().await;
		let jq = env.job_queue;
		let id = jq.submit(&actor(), Vec::new(), true).await.unwrap();

		let job = jq.fetch_and_start().await.unwrap().unwrap();
		assert_eq!(job.id, id);
		assert_eq!(job.command, command(true));
	}
}
