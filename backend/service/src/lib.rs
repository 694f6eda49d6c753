//! Ramify backend services.

use std::sync::Arc;

use branching::{BranchingError, BranchingService, Collaborators};
use bus::{BackendBusFactory, BackendBusService};
use catalog::Catalog;
use config::BackendConfig;
use database::{DatabaseError, DatabaseService};
use job_queue::{JobQueue, JobQueueError};
use license::LicenseService;
use thiserror::Error;

use crate::redis::{RedisError, RedisService};

pub mod branching;
pub mod bus;
pub mod catalog;
pub mod config;
pub mod database;
pub mod directory;
pub mod job_queue;
pub mod license;
pub mod redis;

/// Service container for Ramify backends.
///
/// All services are wrapped with [`Arc`].
#[derive(Debug, Clone)]
pub struct BackendServices {
	pub config: Arc<BackendConfig>,
	/// Absent when running without Redis.
	pub redis: Option<Arc<RedisService>>,
	pub bus: Arc<dyn BackendBusService>,
	pub database: Arc<DatabaseService>,
	pub job_queue: Arc<JobQueue>,
	pub catalog: Arc<Catalog>,
	pub license: Arc<LicenseService>,
	pub branching: Arc<BranchingService>,
}

impl BackendServices {
	#[tracing::instrument(skip(config, bus))]
	pub async fn new<F: BackendBusFactory>(config: BackendConfig, bus: F) -> Result<Self> {
		let config = Arc::new(config);
		let redis = match &config.redis {
			Some(redis) => Some(Arc::new(RedisService::new(redis).await?)),
			None => None,
		};
		let bus: Arc<dyn BackendBusService> = Arc::from(bus.construct(redis.clone()).await?);
		let database = Arc::new(DatabaseService::new(&config.database, redis.as_deref()).await?);
		let job_queue = Arc::new(JobQueue::new(database.clone(), bus.clone()));
		let catalog = Arc::new(Catalog::new(database.clone()));
		let license = Arc::new(LicenseService::new(&config.license));
		let branching = Arc::new(BranchingService::new(Collaborators {
			directory: catalog.clone(),
			permissions: catalog.clone(),
			references: catalog.clone(),
			license: license.clone(),
			jobs: job_queue.clone(),
		}));

		Ok(Self {
			config,
			redis,
			bus,
			database,
			job_queue,
			catalog,
			license,
			branching,
		})
	}
}

/// Backend errors.
#[derive(Debug, Error)]
pub enum BackendError {
	#[error("JSON error: {0}")]
	JsonError(#[from] serde_json::Error),
	#[error(transparent)]
	DatabaseError(#[from] DatabaseError),
	#[error(transparent)]
	RedisError(#[from] RedisError),
	#[error(transparent)]
	JobQueueError(#[from] JobQueueError),
	#[error(transparent)]
	BranchingError(#[from] BranchingError),
}

/// A specialized [`Result`] for backend errors.
pub type Result<T, E = BackendError> = std::result::Result<T, E>;

impl From<diesel::result::Error> for BackendError {
	fn from(value: diesel::result::Error) -> Self {
		Self::DatabaseError(DatabaseError::QueryError(value))
	}
}
