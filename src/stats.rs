//! Shared error accumulator and the statistics aggregator
//! (SPEC_FULL.md §4.10, §9 "shared accumulator of errors").

use crate::model::WhitelistBaseEntity;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Mutex-guarded append-only error list, shared by every concurrent task in a run.
#[derive(Clone, Default)]
pub struct ErrorSink(Arc<Mutex<Vec<String>>>);

impl ErrorSink {
	pub fn new() -> Self {
		ErrorSink::default()
	}

	pub fn record(&self, message: impl Into<String>) {
		self.0.lock().unwrap().push(message.into());
	}

	pub fn into_errors(self) -> Vec<String> {
		Arc::try_unwrap(self.0)
			.map(|mutex| mutex.into_inner().unwrap())
			.unwrap_or_else(|arc| arc.lock().unwrap().clone())
	}
}

/// Final summary of one ingestion run (SPEC_FULL.md §3, §4.10).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
	pub base_entity_count: usize,
	pub entity_count: usize,
	pub failed_entity_count: usize,
	pub archives_copied_count: usize,
	pub resource_transfer_count: usize,
	pub errors: Vec<String>,
}

/// Walk the resolved entity map after all phases and tally the run.
pub fn aggregate(
	bases: &BTreeMap<String, WhitelistBaseEntity>,
	resource_triples_attempted: usize,
	errors: Vec<String>,
) -> IngestStats {
	let mut stats = IngestStats { base_entity_count: bases.len(), errors, ..Default::default() };
	for base in bases.values() {
		for entity in base.entities.values() {
			stats.entity_count += 1;
			if !entity.synced {
				stats.failed_entity_count += 1;
			}
			if entity.archive_copied {
				stats.archives_copied_count += 1;
			}
		}
	}
	stats.resource_transfer_count = resource_triples_attempted;
	stats
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::id::EntityId;
	use crate::model::EntityInfo;
	use std::collections::BTreeMap as Map;

	fn entity(id: &str, synced: bool, copied: bool) -> EntityInfo {
		EntityInfo {
			id: EntityId::parse(id).unwrap(),
			promulgated_id: None,
			channels: Map::new(),
			archive_size: 0,
			hash: String::new(),
			extra_info: Map::new(),
			common_info: Map::new(),
			resources: Map::new(),
			published_resources: Map::new(),
			bundle_charms: Vec::new(),
			synced,
			archive_copied: copied,
		}
	}

	#[test]
	fn tallies_failures_and_copies() {
		let mut base = WhitelistBaseEntity { base_id: "~charmers/wordpress".to_string(), entities: Map::new() };
		base.entities.insert("a".to_string(), entity("~charmers/wordpress-4", true, true));
		base.entities.insert("b".to_string(), entity("~charmers/wordpress-5", false, false));
		let mut bases = BTreeMap::new();
		bases.insert(base.base_id.clone(), base);

		let stats = aggregate(&bases, 3, vec!["some error".to_string()]);
		assert_eq!(stats.base_entity_count, 1);
		assert_eq!(stats.entity_count, 2);
		assert_eq!(stats.failed_entity_count, 1);
		assert_eq!(stats.archives_copied_count, 1);
		assert_eq!(stats.resource_transfer_count, 3);
		assert_eq!(stats.errors, vec!["some error".to_string()]);
	}

	#[test]
	fn error_sink_records_from_clones() {
		let sink = ErrorSink::new();
		let other = sink.clone();
		other.record("boom");
		sink.record("bang");
		let errors = sink.into_errors();
		assert_eq!(errors.len(), 2);
	}
}

// vim: ts=4
