use ramify_backend_service::{
	config::BackendConfig, database::DatabaseConfig, license::LicenseConfig, redis::RedisConfig,
};
use serde::{Deserialize, Serialize};

/// Configuration file of `ramify-web`.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Deserialize, Serialize)]
pub struct RamifyWebConfig {
	pub web: WebConfig,
	pub database: DatabaseConfig,
	/// Without Redis, runners are not woken up and pick jobs on their next poll.
	pub redis: Option<RedisConfig>,
	#[serde(default)]
	pub license: LicenseConfig,
}

impl TryFrom<RamifyWebConfig> for BackendConfig {
	type Error = anyhow::Error;

	fn try_from(config: RamifyWebConfig) -> Result<Self, Self::Error> {
		Ok(BackendConfig {
			database: config.database,
			redis: config.redis,
			license: config.license,
		})
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Hash, Deserialize, Serialize)]
pub struct WebConfig {
	/// Address for the web server to listen on.
	///
	/// Examples:
	/// - `unix://ramify.socket`
	/// - `tcp://127.0.0.1:8000`
	pub listen: String,
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_parse_config() {
		let config = toml::from_str::<RamifyWebConfig>(
			r#"
			[web]
			listen = "tcp://127.0.0.1:8000"

			[database]
			url = "sqlite://ramify.db"

			[license]
			features = ["branching"]
			"#,
		)
		.unwrap();
		assert_eq!(config.web.listen, "tcp://127.0.0.1:8000");
		assert_eq!(config.database.max_connections, 3);
		assert!(config.redis.is_none());

		let backend = BackendConfig::try_from(config).unwrap();
		assert_eq!(backend.license.features.len(), 1);
	}
}
