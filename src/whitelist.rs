//! Whitelist text format and the concurrent resolver that turns declared
//! entries into the resolved entity graph (SPEC_FULL.md §4.4, §6.2).

use crate::error::ValidationError;
use crate::id::{EntityId, UNSPECIFIED_REVISION};
use crate::model::{Channel, EntityInfo, WhitelistBaseEntity};
use crate::pool::Pool;
use crate::registry::{ChannelSelector, RegistryClient};
use crate::stats::ErrorSink;
use futures::future::BoxFuture;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One declared line of the whitelist file (SPEC_FULL.md §3).
#[derive(Debug, Clone)]
pub struct WhitelistEntry {
	pub id: EntityId,
	pub channels: Vec<Channel>,
	pub resources: BTreeMap<String, Vec<i64>>,
}

/// Parse the whitelist text format: `entity-id [channel ...]` per line,
/// blank lines ignored (SPEC_FULL.md §6.2).
pub fn parse_whitelist(text: &str) -> Result<Vec<WhitelistEntry>, ValidationError> {
	let mut entries = Vec::new();
	for line in text.lines() {
		let line = line.trim();
		if line.is_empty() {
			continue;
		}
		let mut tokens = line.split_whitespace();
		let id_token = tokens.next().expect("non-empty line has a first token");
		let id = EntityId::parse(id_token)?;

		let mut channels = Vec::new();
		for token in tokens {
			let channel = Channel::from_str(token).map_err(|_| ValidationError::InvalidChannel {
				entity: id_token.to_string(),
				channel: token.to_string(),
			})?;
			channels.push(channel);
		}
		entries.push(WhitelistEntry { id, channels, resources: BTreeMap::new() });
	}

	if entries.is_empty() {
		return Err(ValidationError::EmptyWhitelist);
	}
	Ok(entries)
}

pub async fn parse_whitelist_file(path: &Path) -> Result<Vec<WhitelistEntry>, ValidationError> {
	let text = tokio::fs::read_to_string(path).await?;
	parse_whitelist(&text)
}

/// Fan out one concurrent task per entry and merge the results into the
/// resolved entity graph (SPEC_FULL.md §4.4).
pub async fn resolve_whitelist(
	entries: Vec<WhitelistEntry>,
	src: Arc<dyn RegistryClient>,
	pool: &Pool,
	errors: &ErrorSink,
) -> BTreeMap<String, WhitelistBaseEntity> {
	let (tx, mut rx) = mpsc::unbounded_channel::<EntityInfo>();

	for mut entry in entries {
		if entry.channels.is_empty() {
			entry.channels = vec![Channel::Stable];
		}
		let src = src.clone();
		let errors = errors.clone();
		let tx = tx.clone();
		pool.spawn(async move { resolve_one(entry, false, src, errors, tx).await }).await;
	}
	drop(tx);
	pool.wait().await;

	let mut bases: BTreeMap<String, WhitelistBaseEntity> = BTreeMap::new();
	while let Some(info) = rx.recv().await {
		merge_into(&mut bases, info);
	}
	for base in bases.values_mut() {
		for entity in base.entities.values_mut() {
			entity.normalize_resources();
		}
	}
	bases
}

fn merge_into(bases: &mut BTreeMap<String, WhitelistBaseEntity>, info: EntityInfo) {
	let base_id = info.id.base_id_string();
	let key = info.id.to_string();
	let base = bases
		.entry(base_id.clone())
		.or_insert_with(|| WhitelistBaseEntity { base_id, entities: BTreeMap::new() });
	match base.entities.get_mut(&key) {
		Some(existing) => existing.merge_from(info),
		None => {
			base.entities.insert(key, info);
		}
	}
}

/// Resolve one whitelist entry across its declared channels, recursing into
/// bundle members (fixed at `stable`, per the open question in SPEC_FULL.md
/// §9). Boxed because the recursion depth is unbounded at the type level
/// (bundle members resolve through the same function).
fn resolve_one(
	entry: WhitelistEntry,
	must_be_charm: bool,
	src: Arc<dyn RegistryClient>,
	errors: ErrorSink,
	tx: mpsc::UnboundedSender<EntityInfo>,
) -> BoxFuture<'static, ()> {
	Box::pin(async move {
		let need_channels: BTreeSet<Channel> = entry.channels.iter().copied().collect();
		let id_string = entry.id.to_string();

		for channel in &entry.channels {
			let mut info = match src.entity_info(ChannelSelector::Channel(*channel), &id_string).await {
				Ok(info) => info,
				Err(e) if e.is_not_found() => {
					errors.record(format!("entity \"{}\" is not available in {} channel", id_string, channel));
					continue;
				}
				Err(e) => {
					errors.record(format!("failed to resolve {}: {}", id_string, e));
					continue;
				}
			};

			info.channels.retain(|c, _| need_channels.contains(c));
			if entry.id.revision != UNSPECIFIED_REVISION {
				for current in info.channels.values_mut() {
					*current = false;
				}
			}

			if !info.resources.is_empty() {
				let mut published = BTreeMap::new();
				for (name, revisions) in &info.resources {
					if let Some(first) = revisions.first() {
						published.insert(name.clone(), *first);
					}
				}
				info.published_resources.insert(*channel, published);
			}
			for (name, revisions) in &entry.resources {
				info.resources.entry(name.clone()).or_default().extend(revisions.iter().copied());
			}

			let is_bundle = info.is_bundle();
			let bundle_charms = info.bundle_charms.clone();
			if tx.send(info).is_err() {
				return;
			}

			if is_bundle {
				if must_be_charm {
					errors.record(format!("bundle {} cannot appear as a bundle member", id_string));
					continue;
				}
				for member in bundle_charms {
					let member_entry = WhitelistEntry {
						id: member.charm_id,
						channels: vec![Channel::Stable],
						resources: member
							.resources
							.into_iter()
							.map(|(name, revision)| (name, vec![revision]))
							.collect(),
					};
					resolve_one(member_entry, true, src.clone(), errors.clone(), tx.clone()).await;
				}
			}
		}
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_entries_with_and_without_channels() {
		let text = "~charmers/wordpress stable candidate\n\nwordpress\n";
		let entries = parse_whitelist(text).unwrap();
		assert_eq!(entries.len(), 2);
		assert_eq!(entries[0].channels, vec![Channel::Stable, Channel::Candidate]);
		assert!(entries[1].channels.is_empty());
	}

	#[test]
	fn rejects_unknown_channel() {
		let err = parse_whitelist("~charmers/wordpress nightly").unwrap_err();
		assert!(matches!(err, ValidationError::InvalidChannel { .. }));
	}

	#[test]
	fn rejects_empty_whitelist() {
		assert!(matches!(parse_whitelist("\n\n"), Err(ValidationError::EmptyWhitelist)));
	}
}

// vim: ts=4
