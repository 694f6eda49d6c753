diesel::table! {
	account (id) {
		id -> BigInt,
		name -> Varchar,
		/// Hex-encoded SHA-256 digest of the account's API token.
		token_digest -> Varchar,
	}
}

diesel::table! {
	project (id) {
		id -> BigInt,
		name -> Varchar,
	}
}

diesel::table! {
	/// Permissions granted to an account in a project.
	///
	/// Any row for a (project, account) pair makes the project visible
	/// to the account.
	project_permission (project_id, account_id, permission) {
		project_id -> BigInt,
		account_id -> BigInt,
		/// Key of a `ProjectPermission`.
		permission -> Varchar,
	}
}

diesel::table! {
	tracker (id) {
		id -> BigInt,
		project_id -> BigInt,
		name -> Varchar,
		key_name -> Varchar,
		/// `TrackerKind` discriminant.
		kind -> Int2,
		/// Source tracker, set when and only when this tracker is a branch.
		origin_id -> Nullable<BigInt>,
		/// Baseline of the source the branch started from.
		baseline_id -> Nullable<BigInt>,
		color -> Nullable<Varchar>,
		description -> Nullable<Text>,
		/// Key of the `PermissionInheritance` of a branch.
		inheritance -> Nullable<Varchar>,
	}
}

diesel::table! {
	reference_field (id) {
		id -> BigInt,
		/// Tracker owning this field.
		tracker_id -> BigInt,
		label -> Varchar,
	}
}

diesel::table! {
	/// Trackers a reference field points at.
	reference_field_target (field_id, target_id) {
		field_id -> BigInt,
		target_id -> BigInt,
	}
}

diesel::table! {
	use crate::db::utils::*;
	use diesel::sql_types::*;

	job_queue (id) {
		/// Unique identifier of this job.
		///
		/// The ID must be a UUID v7, of which timestamp is the time when
		/// the job is enqueued.
		id -> XUuid,
		kind -> VarChar,
		data -> XJson,
		priority -> Int2,
		/// Started time of this job.
		///
		/// This column is null when and only when the job is not started.
		started_at -> Nullable<Timestamp>
	}
}

diesel::joinable!(project_permission -> project (project_id));
diesel::joinable!(project_permission -> account (account_id));
diesel::joinable!(tracker -> project (project_id));
diesel::joinable!(reference_field -> tracker (tracker_id));
diesel::joinable!(reference_field_target -> reference_field (field_id));

diesel::allow_tables_to_appear_in_same_query!(
	account,
	project,
	project_permission,
	tracker,
	reference_field,
	reference_field_target,
	job_queue,
);
