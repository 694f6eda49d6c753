//! [BackendBusService] implementation for the web server.

use std::sync::Arc;

use futures::{
	FutureExt, StreamExt,
	future::{BoxFuture, ready},
};
use ramify_backend_model::bus::{BackendBusMessage, RunnerBusMessage};
use ramify_backend_service::{
	Result,
	bus::{
		BACKEND_BUS_CHANNEL, BackendBusFactory, BackendBusService, BoxedBusService,
		DetachedBusService, RUNNER_BUS_CHANNEL, publish,
	},
	redis::RedisService,
};
use tracing::{debug, error, info};

use crate::WebServices;

#[derive(Debug)]
pub struct WebBusService {
	redis: Arc<RedisService>,
}

impl BackendBusService for WebBusService {
	fn broadcast(&self, message: BackendBusMessage) -> BoxFuture<'_, Result<()>> {
		async move { publish(&self.redis, BACKEND_BUS_CHANNEL, &message).await }.boxed()
	}

	fn send_to_runner(&self, message: RunnerBusMessage) -> BoxFuture<'_, Result<()>> {
		async move { publish(&self.redis, RUNNER_BUS_CHANNEL, &message).await }.boxed()
	}
}

pub struct WebBusFactory;

impl BackendBusFactory for WebBusFactory {
	fn construct(
		self,
		redis: Option<Arc<RedisService>>,
	) -> BoxFuture<'static, Result<BoxedBusService>> {
		let bus: BoxedBusService = match redis {
			Some(redis) => Box::new(WebBusService { redis }),
			None => {
				info!("no Redis configured, backend bus is detached");
				Box::new(DetachedBusService)
			}
		};
		ready(Ok(bus)).boxed()
	}
}

pub async fn handle_bus_message(services: WebServices) -> anyhow::Result<()> {
	let Some(redis) = &services.backend.redis else {
		return Ok(());
	};
	let client = redis.make_client().await?;
	let mut pubsub = client.get_async_pubsub().await?;
	pubsub.subscribe(BACKEND_BUS_CHANNEL).await?;
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
		match channel {
			BACKEND_BUS_CHANNEL => {
				if let Err(error) = handle_backend_bus_message(payload) {
					error!(channel, %error, "failed to handle backend bus message");
				}
			}
			_ => {
				error!(channel, "received bus message from unknown channel");
			}
		}
	}
	Ok(())
}

fn handle_backend_bus_message(message: String) -> anyhow::Result<()> {
	let message = serde_json::from_str::<BackendBusMessage>(&message)?;
	debug!(?message, "received backend bus message");
	match message {
		BackendBusMessage::BranchesCreated { job, trackers } => {
			info!(%job, ?trackers, "branches created");
		}
	}
	Ok(())
}
