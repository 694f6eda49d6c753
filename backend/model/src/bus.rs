//! Backend bus

use serde::{Deserialize, Serialize};

use crate::{job::JobRef, tracker::TrackerRef};

/// A backend bus message that can be broadcasted across the backend bus.
///
/// Backend bus messages will be received by all worker and web
/// instances listening on the bus.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone)]
pub enum BackendBusMessage {
	/// A batch of branches has been created.
	BranchesCreated {
		job: JobRef,
		/// Newly created branch trackers.
		trackers: Vec<TrackerRef>,
	},
}

/// A backend bus message addressed to job runners.
///
/// Not all worker instances will receive the posted message.
/// When posted from a worker instance, the message is handled locally
/// and not published to other instances.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, Clone)]
pub enum RunnerBusMessage {
	ResumeJobRunner,
}

/// Key for distributed locking
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum LockKey {
	Tracker(TrackerRef),
	Misc(&'static str),
}

impl LockKey {
	pub fn to_key(&self) -> String {
		match self {
			LockKey::Tracker(tracker) => format!("lock:tracker:{}", tracker),
			LockKey::Misc(key) => format!("lock:misc:{}", key),
		}
	}
}

impl From<&'static str> for LockKey {
	fn from(value: &'static str) -> Self {
		Self::Misc(value)
	}
}
