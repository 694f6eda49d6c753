//! Incoming reference rewrite maps.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
	branch::Branch,
	tracker::{FieldRef, ReferenceField, TrackerRef},
};

/// Instructions for redirecting reference fields to new branches.
///
/// Maps a reference field to the branches which replace the field's
/// original targets. A field may target several trackers, so every field
/// carries a list. Iteration follows insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RewriteMap {
	fields: IndexMap<FieldRef, RewriteEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteEntry {
	/// Tracker owning the field.
	pub owner: TrackerRef,
	pub branches: Vec<Branch>,
}

impl RewriteMap {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends `branch` to the targets of `field`.
	pub fn push(&mut self, field: &ReferenceField, branch: Branch) {
		self.fields
			.entry(field.id)
			.or_insert_with(|| RewriteEntry {
				owner: field.tracker,
				branches: Vec::new(),
			})
			.branches
			.push(branch);
	}

	pub fn contains(&self, field: FieldRef) -> bool {
		self.fields.contains_key(&field)
	}

	pub fn get(&self, field: FieldRef) -> Option<&[Branch]> {
		self.fields.get(&field).map(|entry| entry.branches.as_slice())
	}

	pub fn owner(&self, field: FieldRef) -> Option<TrackerRef> {
		self.fields.get(&field).map(|entry| entry.owner)
	}

	/// Merges another map into this one.
	///
	/// Branch lists of fields present in both maps are concatenated.
	pub fn merge(&mut self, other: RewriteMap) {
		for (field, entry) in other.fields {
			match self.fields.get_mut(&field) {
				Some(existing) => existing.branches.extend(entry.branches),
				None => {
					self.fields.insert(field, entry);
				}
			}
		}
	}

	/// Returns the entries of fields owned by `owner`.
	pub fn restricted_to(&self, owner: TrackerRef) -> RewriteMap {
		RewriteMap {
			fields: self
				.fields
				.iter()
				.filter(|(_, entry)| entry.owner == owner)
				.map(|(field, entry)| (*field, entry.clone()))
				.collect(),
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = (FieldRef, &[Branch])> {
		self.fields
			.iter()
			.map(|(field, entry)| (*field, entry.branches.as_slice()))
	}

	pub fn len(&self) -> usize {
		self.fields.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn field(id: FieldRef, tracker: TrackerRef) -> ReferenceField {
		ReferenceField {
			id,
			tracker,
			label: format!("field {id}"),
		}
	}

	fn branch(origin: TrackerRef) -> Branch {
		Branch {
			name: "1.0".to_string(),
			key_name: format!("T{origin} » 1.0"),
			color: None,
			description: None,
			project: 1,
			origin,
		}
	}

	#[test]
	fn test_merge_concatenates() {
		let mut left = RewriteMap::new();
		left.push(&field(10, 1), branch(2));
		let mut right = RewriteMap::new();
		right.push(&field(10, 1), branch(3));
		right.push(&field(11, 2), branch(1));

		left.merge(right);
		assert_eq!(left.len(), 2);
		assert_eq!(left.get(10).unwrap(), &[branch(2), branch(3)]);
		assert_eq!(left.get(11).unwrap(), &[branch(1)]);
	}

	#[test]
	fn test_restricted_to_owner() {
		let mut map = RewriteMap::new();
		map.push(&field(10, 1), branch(2));
		map.push(&field(11, 2), branch(1));
		map.push(&field(12, 1), branch(3));

		let restricted = map.restricted_to(1);
		assert_eq!(
			restricted.iter().map(|(field, _)| field).collect::<Vec<_>>(),
			vec![10, 12]
		);
		assert_eq!(restricted.owner(12), Some(1));
		assert!(!restricted.contains(11));
		assert!(map.restricted_to(7).is_empty());
	}

	#[test]
	fn test_json_keys() {
		let mut map = RewriteMap::new();
		map.push(&field(10, 1), branch(2));
		let json = serde_json::to_value(&map).unwrap();
		assert_eq!(json["fields"]["10"]["owner"], 1);
		assert_eq!(serde_json::from_value::<RewriteMap>(json).unwrap(), map);
	}
}
