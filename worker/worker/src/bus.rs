//! [BackendBusService] implementation for workers.

use std::sync::{Arc, OnceLock};

use futures::{
	FutureExt, StreamExt,
	future::{BoxFuture, ready},
};
use ramify_backend_model::bus::{BackendBusMessage, RunnerBusMessage};
use ramify_backend_service::{
	Result,
	bus::{
		BACKEND_BUS_CHANNEL, BackendBusFactory, BackendBusService, BoxedBusService,
		RUNNER_BUS_CHANNEL, publish,
	},
	redis::RedisService,
};
use tracing::{debug, error, info};

use crate::WorkerServices;

#[derive(Debug)]
pub struct WorkerBusService {
	redis: Option<Arc<RedisService>>,
	services: Arc<OnceLock<WorkerServices>>,
}

impl BackendBusService for WorkerBusService {
	fn broadcast(&self, message: BackendBusMessage) -> BoxFuture<'_, Result<()>> {
		async move {
			match &self.redis {
				Some(redis) => publish(redis, BACKEND_BUS_CHANNEL, &message).await,
				None => {
					debug!(?message, "no Redis configured, backend bus message dropped");
					Ok(())
				}
			}
		}
		.boxed()
	}

	fn send_to_runner(&self, message: RunnerBusMessage) -> BoxFuture<'_, Result<()>> {
		if let Some(services) = self.services.get() {
			process_runner_message(message, services);
		}
		ready(Ok(())).boxed()
	}
}

pub struct WorkerBusFactory(pub Arc<OnceLock<WorkerServices>>);

impl BackendBusFactory for WorkerBusFactory {
	fn construct(
		self,
		redis: Option<Arc<RedisService>>,
	) -> BoxFuture<'static, Result<BoxedBusService>> {
		ready(Ok(Box::new(WorkerBusService {
			redis,
			services: self.0,
		}) as BoxedBusService))
		.boxed()
	}
}

pub async fn handle_bus_message(services: WorkerServices) -> anyhow::Result<()> {
	let Some(redis) = &services.backend.redis else {
		info!("no Redis configured, runners are woken up by the job watcher only");
		return Ok(());
	};
	let client = redis.make_client().await?;
	let mut pubsub = client.get_async_pubsub().await?;
	pubsub.subscribe(BACKEND_BUS_CHANNEL).await?;
	pubsub.subscribe(RUNNER_BUS_CHANNEL).await?;
	info!("subscribed to backend bus channel");
	while let Some(msg) = pubsub.on_message().next().await {
		let channel = msg.get_channel_name();
		let payload = match msg.get_payload::<String>() {
			Ok(value) => value,
			Err(error) => {
				error!(channel, %error, "failed to decode bus message");
				continue;
			}
		};
		let result = match channel {
			BACKEND_BUS_CHANNEL => handle_backend_bus_message(payload),
			RUNNER_BUS_CHANNEL => handle_runner_bus_message(payload, &services),
			_ => {
				error!(channel, "received bus message from unknown channel");
				continue;
			}
		};
		if let Err(error) = result {
			error!(channel, %error, "failed to handle bus message");
		}
	}
	Ok(())
}

fn handle_backend_bus_message(message: String) -> anyhow::Result<()> {
	let message = serde_json::from_str::<BackendBusMessage>(&message)?;
	debug!(?message, "received backend bus message");
	Ok(())
}

fn handle_runner_bus_message(message: String, services: &WorkerServices) -> anyhow::Result<()> {
	let message = serde_json::from_str::<RunnerBusMessage>(&message)?;
	process_runner_message(message, services);
	Ok(())
}

fn process_runner_message(message: RunnerBusMessage, services: &WorkerServices) {
	debug!(?message, "processing runner bus message");
	match message {
		RunnerBusMessage::ResumeJobRunner => services.runner.notify_one(),
	}
}
