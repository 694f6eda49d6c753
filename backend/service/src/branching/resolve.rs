use indexmap::IndexMap;
use ramify_backend_model::{
	actor::Actor,
	branch::Branch,
	rewrite::RewriteMap,
	tracker::{ReferenceField, Tracker, TrackerRef},
};
use tracing::debug;

use crate::{Result, directory::ReferenceIndex};

/// Finds the reference fields which must follow a tracker into its new branch.
pub struct ReferenceResolver<'a> {
	pub references: &'a dyn ReferenceIndex,
}

impl ReferenceResolver<'_> {
	/// Maps every field owned by a batch tracker and targeting `source`
	/// to the branch replacing `source`.
	pub async fn resolve(
		&self,
		actor: &Actor,
		batch: &[TrackerRef],
		source: &Tracker,
		branch: &Branch,
	) -> Result<RewriteMap> {
		let in_batch = |field: &ReferenceField| batch.contains(&field.tracker);
		let matches = self
			.references
			.incoming_reference_fields(actor, source, &in_batch)
			.await?;

		let mut rewrites = RewriteMap::new();
		for (owner, fields) in group_by_owner(matches, batch) {
			for field in fields {
				debug!(tracker = source.id, owner, field = field.id, "rewriting reference field");
				rewrites.push(&field, branch.clone());
			}
		}
		Ok(rewrites)
	}
}

/// Groups reference fields by owning tracker, keeping first-seen order.
///
/// Fields owned by trackers outside `batch` and repeated fields are dropped.
pub fn group_by_owner(
	matches: Vec<(Tracker, ReferenceField)>,
	batch: &[TrackerRef],
) -> IndexMap<TrackerRef, Vec<ReferenceField>> {
	let mut groups = IndexMap::<TrackerRef, Vec<ReferenceField>>::new();
	for (owner, field) in matches {
		if !batch.contains(&owner.id) || field.tracker != owner.id {
			continue;
		}
		let fields = groups.entry(owner.id).or_default();
		if !fields.iter().any(|known| known.id == field.id) {
			fields.push(field);
		}
	}
	groups
}
