use kstring::KString;
use serde::{Deserialize, Serialize};

pub type AccountRef = i64;

/// An authenticated account acting on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
	pub id: AccountRef,
	pub name: KString,
}
