//! Backend bus

use std::{fmt::Debug, sync::Arc};

use ::redis::AsyncCommands;
use futures::{
	FutureExt,
	future::{BoxFuture, ready},
};
use ramify_backend_model::bus::{BackendBusMessage, RunnerBusMessage};
use serde::Serialize;
use tracing::debug;

use crate::{
	Result,
	redis::{RedisError, RedisService},
};

pub trait BackendBusService
where
	Self: Send + Sync + Debug,
{
	/// Publishes a message to all web and worker instances.
	fn broadcast(&self, message: BackendBusMessage) -> BoxFuture<'_, Result<()>>;
	/// Posts a message to job runners.
	fn send_to_runner(&self, message: RunnerBusMessage) -> BoxFuture<'_, Result<()>>;
}

pub type BoxedBusService = Box<dyn BackendBusService + 'static>;

pub trait BackendBusFactory {
	fn construct(
		self,
		redis: Option<Arc<RedisService>>,
	) -> BoxFuture<'static, Result<BoxedBusService>>;
}

pub const BACKEND_BUS_CHANNEL: &str = "bus:backend";
pub const RUNNER_BUS_CHANNEL: &str = "bus:runner";

/// Serializes `message` as JSON and publishes it on `channel`.
pub async fn publish<M: Serialize>(redis: &RedisService, channel: &str, message: &M) -> Result<()> {
	let message = serde_json::to_string(message)?;
	let _: () = redis
		.get()
		.await?
		.publish(channel, message.as_str())
		.await
		.map_err(RedisError::RedisError)?;
	Ok(())
}

/// A bus which is not connected to any other instance.
///
/// Messages are logged and dropped.
#[derive(Debug, Default)]
pub struct DetachedBusService;

impl BackendBusService for DetachedBusService {
	fn broadcast(&self, message: BackendBusMessage) -> BoxFuture<'_, Result<()>> {
		debug!(?message, "dropping backend bus message on detached bus");
		ready(Ok(())).boxed()
	}

	fn send_to_runner(&self, message: RunnerBusMessage) -> BoxFuture<'_, Result<()>> {
		debug!(?message, "dropping runner bus message on detached bus");
		ready(Ok(())).boxed()
	}
}

pub struct DetachedBusFactory;

impl BackendBusFactory for DetachedBusFactory {
	fn construct(
		self,
		_redis: Option<Arc<RedisService>>,
	) -> BoxFuture<'static, Result<BoxedBusService>> {
		ready(Ok(Box::new(DetachedBusService) as BoxedBusService)).boxed()
	}
}
