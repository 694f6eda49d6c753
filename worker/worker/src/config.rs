use ramify_backend_service::{
	config::BackendConfig, database::DatabaseConfig, license::LicenseConfig, redis::RedisConfig,
};
use serde::{Deserialize, Serialize};

/// Configuration file of `ramify-worker`.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Deserialize, Serialize)]
pub struct RamifyWorkerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	/// Without Redis, runners only wake up on the periodic job scan.
	pub redis: Option<RedisConfig>,
	#[serde(default)]
	pub license: LicenseConfig,
	/// Number of concurrent job runners.
	#[serde(default = "default_runners")]
	pub runners: usize,
}

fn default_runners() -> usize {
	2
}

impl TryFrom<RamifyWorkerConfig> for BackendConfig {
	type Error = anyhow::Error;

	fn try_from(config: RamifyWorkerConfig) -> Result<Self, Self::Error> {
		Ok(BackendConfig {
			database: config.database,
			redis: config.redis,
			license: config.license,
		})
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Hash, Deserialize, Serialize)]
pub struct HttpConfig {
	/// Address for the health endpoint to listen on.
	///
	/// Examples:
	/// - `unix://worker.socket`
	/// - `tcp://127.0.0.1:8001`
	pub listen: String,
}
