use serde::{Deserialize, Serialize};

use crate::{database::DatabaseConfig, license::LicenseConfig, redis::RedisConfig};

#[derive(Debug, PartialEq, Eq, Clone, Hash, Deserialize, Serialize)]
pub struct BackendConfig {
	pub database: DatabaseConfig,
	/// Redis is required when more than one backend instance is running.
	pub redis: Option<RedisConfig>,
	#[serde(default)]
	pub license: LicenseConfig,
}
