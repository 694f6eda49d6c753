use axum::{
	Router,
	routing::{get, post},
};

use crate::WebServices;

pub mod auth;
mod branch;
pub mod error;

pub fn api_router() -> Router<WebServices> {
	Router::new()
		.route("/", get(handler))
		.route("/create-branches", post(branch::create_branches))
		.route("/trackers/{tracker_id}/branches", get(branch::list_branches))
}

async fn handler() -> &'static str {
	concat!("Ramify Web API v3 ", env!("CARGO_PKG_VERSION"))
}
