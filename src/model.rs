//! Core data types shared by the resolver, scheduler, and statistics aggregator.
//!
//! See SPEC_FULL.md §3 for the authoritative description of each type and its
//! invariants.

use crate::id::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A named release track. Each base entity has at most one "current" revision
/// per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
	Unpublished,
	Edge,
	Beta,
	Candidate,
	Stable,
}

impl Channel {
	/// Canonical ordering in which permissions are reconciled (SPEC_FULL.md §4.9).
	pub const ALL: [Channel; 5] = [
		Channel::Unpublished,
		Channel::Edge,
		Channel::Beta,
		Channel::Candidate,
		Channel::Stable,
	];
}

impl FromStr for Channel {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"unpublished" => Ok(Channel::Unpublished),
			"edge" => Ok(Channel::Edge),
			"beta" => Ok(Channel::Beta),
			"candidate" => Ok(Channel::Candidate),
			"stable" => Ok(Channel::Stable),
			_ => Err(format!("unknown channel: {}", s)),
		}
	}
}

impl fmt::Display for Channel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Channel::Unpublished => "unpublished",
			Channel::Edge => "edge",
			Channel::Beta => "beta",
			Channel::Candidate => "candidate",
			Channel::Stable => "stable",
		};
		write!(f, "{}", s)
	}
}

/// One charm referenced by a bundle, with the resource revisions it pins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleMember {
	pub charm_id: EntityId,
	pub resources: BTreeMap<String, i64>,
}

/// A concrete revision to sync (SPEC_FULL.md §3).
#[derive(Debug, Clone)]
pub struct EntityInfo {
	/// Canonical id; always has a non-empty owner once resolved.
	pub id: EntityId,
	/// Owner-less public alias, if the registry operator assigned one.
	pub promulgated_id: Option<EntityId>,
	/// Per-channel "is this the current revision" flag. Sticky: once `true`,
	/// merges never clear it back to `false` (SPEC_FULL.md §4.4 merge rule).
	pub channels: BTreeMap<Channel, bool>,
	pub archive_size: u64,
	/// Hex-encoded SHA-384 of the archive.
	pub hash: String,
	pub extra_info: BTreeMap<String, serde_json::Value>,
	pub common_info: BTreeMap<String, serde_json::Value>,
	/// Resource name -> sorted list of revisions to transfer.
	pub resources: BTreeMap<String, Vec<i64>>,
	/// Resource name -> revision currently bound on that channel at the source.
	pub published_resources: BTreeMap<Channel, BTreeMap<String, i64>>,
	pub bundle_charms: Vec<BundleMember>,
	/// Set once `publish_entity` has succeeded for every current channel.
	pub synced: bool,
	/// Set once the archive has actually been uploaded this run.
	pub archive_copied: bool,
}

impl EntityInfo {
	pub fn is_bundle(&self) -> bool {
		self.id.is_bundle()
	}

	/// Channels for which this revision is current, in canonical order.
	pub fn current_channels(&self) -> Vec<Channel> {
		Channel::ALL.iter().copied().filter(|c| self.channels.get(c).copied().unwrap_or(false)).collect()
	}

	/// Merge a later resolution of the same canonical id into this one
	/// (SPEC_FULL.md §4.4 merge rule). `self` is the entry already in the map.
	pub fn merge_from(&mut self, other: EntityInfo) {
		for (channel, current) in other.channels {
			let slot = self.channels.entry(channel).or_insert(false);
			*slot = *slot || current;
		}
		for (name, revisions) in other.resources {
			self.resources.entry(name).or_default().extend(revisions);
		}
		for (channel, resources) in other.published_resources {
			self.published_resources.insert(channel, resources);
		}
		if self.promulgated_id.is_none() {
			self.promulgated_id = other.promulgated_id;
		}
	}

	/// Sort and dedup every resource revision list; called once after all
	/// resolver tasks have merged into the output map.
	pub fn normalize_resources(&mut self) {
		for revisions in self.resources.values_mut() {
			revisions.sort_unstable();
			revisions.dedup();
		}
	}
}

/// Group of `EntityInfo`s sharing a base id (SPEC_FULL.md §3).
#[derive(Debug, Clone, Default)]
pub struct WhitelistBaseEntity {
	pub base_id: String,
	/// Keyed by the canonical id's display string.
	pub entities: BTreeMap<String, EntityInfo>,
}

/// Read/write principal lists for one channel of a base entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
	pub read: Vec<String>,
	pub write: Vec<String>,
}

impl Permissions {
	pub fn owner_only(owner: &str) -> Self {
		Permissions { read: vec![owner.to_string()], write: vec![owner.to_string()] }
	}
}

/// Dedup key for the resource transfer phase (SPEC_FULL.md §3, §4.8).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResourceRef {
	pub base_id: String,
	pub name: String,
	pub revision: i64,
}

// vim: ts=4
