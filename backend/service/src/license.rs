use kstring::KString;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::directory::LicenseGate;

/// Licensed feature enabling branch creation.
pub const BRANCHING_FEATURE: &str = "branching";

/// Configuration for [`LicenseService`].
#[derive(Debug, PartialEq, Eq, Clone, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LicenseConfig {
	/// Licensed features, e.g. `["branching"]`.
	#[serde(default)]
	pub features: Vec<KString>,
}

#[derive(Debug)]
pub struct LicenseService {
	branching: bool,
}

impl LicenseService {
	pub fn new(config: &LicenseConfig) -> Self {
		let branching = config
			.features
			.iter()
			.any(|feature| feature.as_str() == BRANCHING_FEATURE);
		if !branching {
			warn!("no branching license, branch creation is disabled");
		}
		Self { branching }
	}
}

impl LicenseGate for LicenseService {
	fn has_branching_license(&self) -> bool {
		self.branching
	}
}
