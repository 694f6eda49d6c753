use diesel::{
	QueryResult, RunQueryDsl, SqliteConnection,
	connection::{AnsiTransactionManager, SimpleConnection, TransactionManager},
	migration::MigrationVersion,
	query_builder::AsQuery,
	query_dsl::methods::{ExecuteDsl, LoadQuery},
};
use diesel_async::{
	AnsiTransactionManager as AsyncAnsiTransactionManager, AsyncPgConnection,
	RunQueryDsl as AsyncRunQueryDsl, SimpleAsyncConnection,
	TransactionManager as AsyncTransactionManager,
	async_connection_wrapper::AsyncConnectionWrapper,
	methods::{ExecuteDsl as AsyncExecuteDsl, LoadQuery as AsyncLoadQuery},
	pooled_connection::PoolableConnection,
};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use futures::future::{BoxFuture, FutureExt, ready};

pub mod schema;
pub mod utils;

/// A connection to either of the supported databases.
///
/// PostgreSQL connections are asynchronous. SQLite connections are
/// synchronous and their results are wrapped in ready futures.
pub enum BoxedSqlConn {
	Pg(AsyncPgConnection),
	Sqlite(SqliteConnection),
}

impl BoxedSqlConn {
	/// Executes `SELECT 1` to test if the connection is ready for use.
	pub fn ping(&mut self) -> BoxFuture<Result<(), diesel::result::Error>> {
		match self {
			BoxedSqlConn::Pg(conn) => conn.batch_execute("SELECT 1").boxed(),
			BoxedSqlConn::Sqlite(conn) => ready(conn.batch_execute("SELECT 1")).boxed(),
		}
	}

	pub fn is_broken(&mut self) -> bool {
		match self {
			BoxedSqlConn::Pg(conn) => conn.is_broken(),
			BoxedSqlConn::Sqlite(conn) => {
				AnsiTransactionManager::is_broken_transaction_manager(conn)
			}
		}
	}

	/// Runs `callback` in a transaction.
	///
	/// The transaction is committed if `callback` succeeds, and rolled back otherwise.
	pub async fn transaction<R, E, F>(&mut self, callback: F) -> Result<R, E>
	where
		F: AsyncFnOnce(&mut Self) -> Result<R, E>,
		E: From<diesel::result::Error> + Send,
		R: Send,
	{
		match self {
			BoxedSqlConn::Pg(conn) => {
				AsyncAnsiTransactionManager::begin_transaction(conn).await?;
			}
			BoxedSqlConn::Sqlite(conn) => {
				AnsiTransactionManager::begin_transaction(conn)?;
			}
		}
		match callback(self).await {
			Ok(value) => {
				match self {
					BoxedSqlConn::Pg(conn) => {
						AsyncAnsiTransactionManager::commit_transaction(conn).await?;
					}
					BoxedSqlConn::Sqlite(conn) => {
						AnsiTransactionManager::commit_transaction(conn)?;
					}
				}
				Ok(value)
			}
			Err(user_error) => {
				let result = match self {
					BoxedSqlConn::Pg(conn) => {
						AsyncAnsiTransactionManager::rollback_transaction(conn).await
					}
					BoxedSqlConn::Sqlite(conn) => {
						AnsiTransactionManager::rollback_transaction(conn)
					}
				};
				match result {
					// a broken transaction manager was most likely caused
					// by the user error itself
					Ok(()) | Err(diesel::result::Error::BrokenTransactionManager) => {
						Err(user_error)
					}
					Err(rollback_error) => Err(rollback_error.into()),
				}
			}
		}
	}
}

impl<'query> BoxedSqlConn {
	/// Executes the given command, returning the number of rows affected.
	///
	/// Dispatches [RunQueryDsl::execute].
	pub fn execute<Q>(&mut self, query: Q) -> BoxFuture<'query, QueryResult<usize>>
	where
		Q: AsyncExecuteDsl<AsyncPgConnection> + 'query,
		Q: ExecuteDsl<SqliteConnection>,
	{
		match self {
			BoxedSqlConn::Pg(conn) => AsyncExecuteDsl::execute(query, conn),
			BoxedSqlConn::Sqlite(conn) => ready(ExecuteDsl::execute(query, conn)).boxed(),
		}
	}

	/// Executes the given query, returning a [`Vec`] with the returned rows.
	///
	/// Dispatches [RunQueryDsl::load].
	pub fn load<'conn, Q, U>(&'conn mut self, query: Q) -> BoxFuture<'query, QueryResult<Vec<U>>>
	where
		Q: Send,
		Q: AsyncLoadQuery<'query, AsyncPgConnection, U> + 'query,
		Q: LoadQuery<'query, SqliteConnection, U>,
		U: Send + 'query,
		'conn: 'query,
	{
		match self {
			BoxedSqlConn::Pg(conn) => AsyncRunQueryDsl::load(query, conn).boxed(),
			BoxedSqlConn::Sqlite(conn) => ready(RunQueryDsl::load(query, conn)).boxed(),
		}
	}

	/// Runs the command, and returns the affected row.
	///
	/// `Err(NotFound)` will be returned if the query affected 0 rows. You can
	/// call `.optional()` on the result of this if the command was optional to
	/// get back a `Result<Option<U>>`
	///
	/// Dispatches [RunQueryDsl::get_result].
	pub fn get_result<Q, U>(&'query mut self, query: Q) -> BoxFuture<'query, QueryResult<U>>
	where
		Q: AsQuery + Send,
		Q: AsyncLoadQuery<'query, AsyncPgConnection, U> + 'query,
		Q: LoadQuery<'query, SqliteConnection, U>,
		U: Send + 'query,
	{
		match self {
			BoxedSqlConn::Pg(conn) => AsyncRunQueryDsl::get_result(query, conn).boxed(),
			BoxedSqlConn::Sqlite(conn) => ready(RunQueryDsl::get_result(query, conn)).boxed(),
		}
	}
}

const POSTGRESQL_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/postgresql");
const SQLITE_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");

/// Runs all pending PostgreSQL migrations.
///
/// This is not async, so a spawn-blocking wrapper is required.
///
/// Dispatches [MigrationHarness::run_pending_migrations].
pub fn run_pg_migrations(
	conn: AsyncPgConnection,
) -> diesel::migration::Result<Vec<MigrationVersion<'static>>> {
	let mut async_wrapper: AsyncConnectionWrapper<AsyncPgConnection> =
		AsyncConnectionWrapper::from(conn);
	async_wrapper
		.run_pending_migrations(POSTGRESQL_MIGRATIONS)
		.map(|versions| {
			versions
				.into_iter()
				.map(|version| version.as_owned())
				.collect()
		})
}

/// Runs all pending SQLite migrations in place.
///
/// An in-memory SQLite database only lives as long as its connection,
/// so migrations must run on the connection which is going to be used.
pub fn run_sqlite_migrations(
	conn: &mut SqliteConnection,
) -> diesel::migration::Result<Vec<MigrationVersion<'static>>> {
	conn.run_pending_migrations(SQLITE_MIGRATIONS)
		.map(|versions| {
			versions
				.into_iter()
				.map(|version| version.as_owned())
				.collect()
		})
}

#[cfg(test)]
pub(crate) mod test {
	use diesel::Connection;

	use super::*;

	#[test]
	fn test_sqlite_migrations() {
		let mut conn = SqliteConnection::establish(":memory:").unwrap();
		let versions = run_sqlite_migrations(&mut conn).unwrap();
		assert_eq!(versions.len(), 1);
		assert!(run_sqlite_migrations(&mut conn).unwrap().is_empty());
	}
}
