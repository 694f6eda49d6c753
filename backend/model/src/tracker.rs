use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub type TrackerRef = i64;
pub type ProjectRef = i64;
pub type FieldRef = i64;
pub type BaselineRef = i64;

/// Type classification of a tracker.
///
/// Stored as a small integer column. Unknown values are decoded as [TrackerKind::Unknown],
/// which is never branchable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TrackerKind {
	Requirement = 0,
	UserStory = 1,
	Task = 2,
	Bug = 3,
	TestCase = 4,
	TestSet = 5,
	/// Results of executed test sets.
	TestRun = 6,
	Release = 7,
	Team = 8,
	/// Configuration items.
	Configuration = 9,
	Unknown = 255,
}

/// Tracker kinds which cannot be branched.
pub const NON_BRANCHABLE_KINDS: [TrackerKind; 5] = [
	TrackerKind::TestRun,
	TrackerKind::Release,
	TrackerKind::Team,
	TrackerKind::Configuration,
	TrackerKind::Unknown,
];

impl TrackerKind {
	pub fn is_branchable(&self) -> bool {
		!NON_BRANCHABLE_KINDS.contains(self)
	}

	pub fn as_key(&self) -> &'static str {
		match self {
			Self::Requirement => "requirement",
			Self::UserStory => "user_story",
			Self::Task => "task",
			Self::Bug => "bug",
			Self::TestCase => "test_case",
			Self::TestSet => "test_set",
			Self::TestRun => "test_run",
			Self::Release => "release",
			Self::Team => "team",
			Self::Configuration => "configuration",
			Self::Unknown => "unknown",
		}
	}
}

impl From<i16> for TrackerKind {
	fn from(value: i16) -> Self {
		match value {
			0 => Self::Requirement,
			1 => Self::UserStory,
			2 => Self::Task,
			3 => Self::Bug,
			4 => Self::TestCase,
			5 => Self::TestSet,
			6 => Self::TestRun,
			7 => Self::Release,
			8 => Self::Team,
			9 => Self::Configuration,
			_ => Self::Unknown,
		}
	}
}

impl Display for TrackerKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_key())
	}
}

/// A work-item container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracker {
	pub id: TrackerRef,
	/// Owning project.
	pub project: ProjectRef,
	pub name: String,
	/// Short key, e.g. `PROD`.
	pub key_name: String,
	pub kind: TrackerKind,
	/// The tracker this one was branched from.
	pub origin: Option<TrackerRef>,
}

/// A field of a tracker linking its items to items of other trackers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceField {
	pub id: FieldRef,
	/// Tracker this field belongs to.
	pub tracker: TrackerRef,
	pub label: String,
}

/// Project-level permissions.
///
/// Stored as text keys in `project_permission`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectPermission {
	/// Read access to the trackers of a project.
	View,
	/// Creating and managing branches.
	BranchAdmin,
	/// Project administration. Implies every other permission.
	Admin,
}

impl ProjectPermission {
	pub const fn as_key(&self) -> &'static str {
		match self {
			Self::View => "view",
			Self::BranchAdmin => "branch_admin",
			Self::Admin => "admin",
		}
	}

	pub fn from_key(key: &str) -> Option<Self> {
		match key {
			"view" => Some(Self::View),
			"branch_admin" => Some(Self::BranchAdmin),
			"admin" => Some(Self::Admin),
			_ => None,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_kind_from_column() {
		assert_eq!(TrackerKind::from(TrackerKind::Bug as u8 as i16), TrackerKind::Bug);
		assert_eq!(
			TrackerKind::from(TrackerKind::Configuration as u8 as i16),
			TrackerKind::Configuration
		);
		assert_eq!(TrackerKind::from(42), TrackerKind::Unknown);
		assert_eq!(TrackerKind::from(-1), TrackerKind::Unknown);
	}

	#[test]
	fn test_branchable_kinds() {
		assert!(TrackerKind::Requirement.is_branchable());
		assert!(TrackerKind::TestCase.is_branchable());
		assert!(!TrackerKind::TestRun.is_branchable());
		assert!(!TrackerKind::Release.is_branchable());
		assert!(!TrackerKind::Unknown.is_branchable());
	}

	#[test]
	fn test_permission_keys() {
		for permission in [
			ProjectPermission::View,
			ProjectPermission::BranchAdmin,
			ProjectPermission::Admin,
		] {
			assert_eq!(ProjectPermission::from_key(permission.as_key()), Some(permission));
		}
		assert_eq!(ProjectPermission::from_key("owner"), None);
	}
}
