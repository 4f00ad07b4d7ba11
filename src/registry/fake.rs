//! In-memory [`RegistryClient`](super::RegistryClient), used as both source
//! and destination double in the core's own tests (SPEC_FULL.md §9 lists this
//! as one of the two trait implementations).

use super::{BaseEntityPermissions, ChannelSelector, RegistryClient, RegistryResult, SeekableReader, SizedStream};
use crate::error::RegistryError;
use crate::model::{BundleMember, Channel, EntityInfo, Permissions};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Mutex;
use tokio::io::AsyncReadExt;

/// One seeded or uploaded archive, addressed by its full canonical id string.
#[derive(Debug, Clone)]
struct StoredEntity {
	info: EntityInfo,
	archive: Vec<u8>,
	resources: BTreeMap<(String, i64), Vec<u8>>,
}

#[derive(Default)]
struct State {
	/// Keyed by the canonical id's display string, e.g. `~charmers/wordpress-4`.
	entities: BTreeMap<String, StoredEntity>,
	/// `(base-id-string, channel) -> canonical id string`, the "what's current here" index.
	current: BTreeMap<(String, Channel), String>,
	permissions: BTreeMap<String, BaseEntityPermissions>,
}

/// An in-memory registry. Cheap to construct; seed it with [`FakeRegistryClient::seed`]
/// to act as a source, or leave empty to act as a destination.
#[derive(Default)]
pub struct FakeRegistryClient {
	state: Mutex<State>,
}

impl FakeRegistryClient {
	pub fn new() -> Self {
		FakeRegistryClient::default()
	}

	/// Seed a fully-formed entity plus its archive bytes, as a source would
	/// already have it before any run. Marks it current on every channel set
	/// in `info.channels`.
	pub fn seed(&self, info: EntityInfo, archive: Vec<u8>) {
		let mut state = self.state.lock().unwrap();
		let key = info.id.to_string();
		let base = info.id.base_id_string();
		for (channel, current) in &info.channels {
			if *current {
				state.current.insert((base.clone(), *channel), key.clone());
			}
		}
		// A real registry creates the base entity (with default owner-only
		// permissions) the moment any revision under it exists.
		state.permissions.entry(base).or_default();
		state.entities.insert(key, StoredEntity { info, archive, resources: BTreeMap::new() });
	}

	/// Seed a resource body for an already-seeded entity.
	pub fn seed_resource(&self, base_id: &str, name: &str, revision: i64, body: Vec<u8>) {
		let mut state = self.state.lock().unwrap();
		if let Some(entity) =
			state.entities.values_mut().find(|e| e.info.id.base_id_string() == base_id)
		{
			entity.resources.insert((name.to_string(), revision), body);
		}
	}

	fn lookup_revisionless<'a>(
		state: &'a State,
		channel: Channel,
		id: &str,
	) -> Option<&'a StoredEntity> {
		let base = crate::id::EntityId::parse(id).ok()?.base_id_string();
		let current_key = state.current.get(&(base, channel))?;
		state.entities.get(current_key)
	}

	/// Resource operations are addressed by base id, not canonical id
	/// (SPEC_FULL.md §4.8's `ResourceRef`); find the stored entity the same
	/// way `seed_resource` does.
	fn lookup_by_base_id<'a>(state: &'a State, base_id: &str) -> Option<&'a StoredEntity> {
		state.entities.values().find(|e| e.info.id.base_id_string() == base_id)
	}

	fn lookup_by_base_id_mut<'a>(state: &'a mut State, base_id: &str) -> Option<&'a mut StoredEntity> {
		state.entities.values_mut().find(|e| e.info.id.base_id_string() == base_id)
	}
}

#[async_trait]
impl RegistryClient for FakeRegistryClient {
	async fn entity_info(&self, channel: ChannelSelector, id: &str) -> RegistryResult<EntityInfo> {
		let state = self.state.lock().unwrap();
		let found = match channel {
			ChannelSelector::NoChannel => state.entities.get(id),
			ChannelSelector::Channel(c) => {
				state.entities.get(id).or_else(|| Self::lookup_revisionless(&state, c, id))
			}
		};
		found.map(|e| e.info.clone()).ok_or(RegistryError::NotFound)
	}

	async fn get_base_entity(&self, base_id: &str) -> RegistryResult<BaseEntityPermissions> {
		let state = self.state.lock().unwrap();
		state.permissions.get(base_id).cloned().ok_or(RegistryError::NotFound)
	}

	async fn get_archive(&self, id: &str) -> RegistryResult<SizedStream> {
		let state = self.state.lock().unwrap();
		let entity = state.entities.get(id).ok_or(RegistryError::NotFound)?;
		let bytes = entity.archive.clone();
		let len = bytes.len() as u64;
		Ok((Box::new(Cursor::new(bytes)), len))
	}

	async fn put_archive(
		&self,
		id: &str,
		mut reader: Box<dyn SeekableReader>,
		hash: &str,
		size: u64,
		promulgated_rev: i64,
		channels: &[Channel],
	) -> RegistryResult<()> {
		let mut archive = Vec::new();
		reader.read_to_end(&mut archive).await.map_err(RegistryError::transport)?;

		let mut state = self.state.lock().unwrap();
		if let Some(existing) = state.entities.get(id) {
			if existing.info.archive_size != size || existing.info.hash != hash {
				return Err(RegistryError::Conflict {
					message: format!("{} already exists with a different archive", id),
				});
			}
			return Ok(());
		}

		let parsed = crate::id::EntityId::parse(id)
			.map_err(|e| RegistryError::transport(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;
		let promulgated_id = if promulgated_rev >= 0 { Some(parsed.with_revision(promulgated_rev)) } else { None };
		let info = EntityInfo {
			id: parsed,
			promulgated_id,
			channels: channels.iter().map(|c| (*c, false)).collect(),
			archive_size: size,
			hash: hash.to_string(),
			extra_info: BTreeMap::new(),
			common_info: BTreeMap::new(),
			resources: BTreeMap::new(),
			published_resources: BTreeMap::new(),
			bundle_charms: Vec::<BundleMember>::new(),
			synced: false,
			archive_copied: true,
		};
		state.permissions.entry(info.id.base_id_string()).or_default();
		state.entities.insert(id.to_string(), StoredEntity { info, archive, resources: BTreeMap::new() });
		Ok(())
	}

	async fn put_extra_info(
		&self,
		id: &str,
		extra_info: &BTreeMap<String, Option<serde_json::Value>>,
	) -> RegistryResult<()> {
		let mut state = self.state.lock().unwrap();
		let entity = state.entities.get_mut(id).ok_or(RegistryError::NotFound)?;
		for (key, value) in extra_info {
			match value {
				Some(v) => {
					entity.info.extra_info.insert(key.clone(), v.clone());
				}
				None => {
					entity.info.extra_info.remove(key);
				}
			}
		}
		Ok(())
	}

	async fn set_perm(&self, id: &str, channel: Channel, perms: &Permissions) -> RegistryResult<()> {
		let mut state = self.state.lock().unwrap();
		let base = crate::id::EntityId::parse(id)
			.map_err(|e| RegistryError::transport(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?
			.base_id_string();
		state.permissions.entry(base).or_default().channels.insert(channel, perms.clone());
		Ok(())
	}

	async fn publish(
		&self,
		id: &str,
		channels: &[Channel],
		resources: &BTreeMap<String, i64>,
	) -> RegistryResult<()> {
		let mut state = self.state.lock().unwrap();
		let base = state.entities.get(id).ok_or(RegistryError::NotFound)?.info.id.base_id_string();
		for channel in channels {
			state.current.insert((base.clone(), *channel), id.to_string());
		}
		let entity = state.entities.get_mut(id).ok_or(RegistryError::NotFound)?;
		for channel in channels {
			entity.info.channels.insert(*channel, true);
			entity.info.published_resources.insert(*channel, resources.clone());
		}
		Ok(())
	}

	async fn resource_info(&self, id: &str, name: &str, revision: i64) -> RegistryResult<()> {
		let state = self.state.lock().unwrap();
		let entity = Self::lookup_by_base_id(&state, id).ok_or(RegistryError::NotFound)?;
		if entity.resources.contains_key(&(name.to_string(), revision)) {
			Ok(())
		} else {
			Err(RegistryError::NotFound)
		}
	}

	async fn get_resource(&self, id: &str, name: &str, revision: i64) -> RegistryResult<SizedStream> {
		let state = self.state.lock().unwrap();
		let entity = Self::lookup_by_base_id(&state, id).ok_or(RegistryError::NotFound)?;
		let bytes =
			entity.resources.get(&(name.to_string(), revision)).cloned().ok_or(RegistryError::NotFound)?;
		let len = bytes.len() as u64;
		Ok((Box::new(Cursor::new(bytes)), len))
	}

	async fn put_resource(
		&self,
		id: &str,
		name: &str,
		revision: i64,
		mut reader: Box<dyn SeekableReader>,
		_size: u64,
	) -> RegistryResult<()> {
		let mut bytes = Vec::new();
		reader.read_to_end(&mut bytes).await.map_err(RegistryError::transport)?;
		let mut state = self.state.lock().unwrap();
		let entity = Self::lookup_by_base_id_mut(&mut state, id).ok_or(RegistryError::NotFound)?;
		entity.resources.insert((name.to_string(), revision), bytes);
		Ok(())
	}
}


// vim: ts=4
