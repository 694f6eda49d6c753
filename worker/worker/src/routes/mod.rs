use anyhow::Result;
use axum::{Router, extract::State, routing::get};

use crate::WorkerServices;

pub fn make_router(services: WorkerServices) -> Result<Router> {
	let router = Router::new()
		.route("/", get(handler))
		.route("/health", get(health))
		.with_state(services);

	Ok(router)
}

async fn handler() -> &'static str {
	concat!("Ramify Worker ", env!("CARGO_PKG_VERSION"))
}

/// Reports the number of pending jobs, up to 1000.
async fn health(State(services): State<WorkerServices>) -> String {
	match services.backend.job_queue.count_pending(1000).await {
		Ok(pending) => format!("ok, {pending} pending jobs"),
		Err(error) => format!("degraded: {error}"),
	}
}
