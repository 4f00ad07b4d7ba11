//! Five-phase scheduler: transfers and publishes every entity, in the strict
//! order resource dependencies require (SPEC_FULL.md §4.5-§4.9).

use crate::disk::DiskLimiter;
use crate::id::EntityId;
use crate::model::{Channel, EntityInfo, Permissions, ResourceRef, WhitelistBaseEntity};
use crate::pool::Pool;
use crate::registry::{ChannelSelector, RegistryClient};
use crate::reopen::Reopener;
use crate::stats::ErrorSink;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;

/// One resolved entity plus the fields the scheduler needs without locking
/// its cell (its id never changes once resolution has finished).
#[derive(Clone)]
struct ResolvedEntity {
	id: EntityId,
	base_id: String,
	is_bundle: bool,
	cell: Arc<Mutex<EntityInfo>>,
}

/// Shared, read-only context every phase task needs.
pub struct SchedulerContext {
	pub src: Arc<dyn RegistryClient>,
	pub dest: Arc<dyn RegistryClient>,
	pub pool: Pool,
	pub disk: DiskLimiter,
	pub errors: ErrorSink,
	/// Principal written into `write` when permissions are reconciled onto
	/// their defaults; `None` leaves `write` empty (SPEC_FULL.md §4.9, §4.11).
	pub permission_owner: Option<String>,
}

/// Run all five phases over the resolver's output and return the mutated
/// entity graph plus the count of unique resource triples attempted
/// (SPEC_FULL.md §4.10 needs the latter for `resource_transfer_count`).
pub async fn run_phases(
	bases: BTreeMap<String, WhitelistBaseEntity>,
	ctx: &SchedulerContext,
) -> (BTreeMap<String, WhitelistBaseEntity>, usize) {
	let mut entities = Vec::new();
	for (base_id, base) in &bases {
		for info in base.entities.values() {
			entities.push(ResolvedEntity {
				id: info.id.clone(),
				base_id: base_id.clone(),
				is_bundle: info.is_bundle(),
				cell: Arc::new(Mutex::new(info.clone())),
			});
		}
	}

	let charms: Vec<ResolvedEntity> = entities.iter().filter(|e| !e.is_bundle).cloned().collect();
	let bundles: Vec<ResolvedEntity> = entities.iter().filter(|e| e.is_bundle).cloned().collect();

	// Phase 1: charm transfer.
	for entity in &charms {
		let entity = entity.clone();
		let ctx = ctx.clone_refs();
		ctx.pool.spawn(async move { transfer_entity(&entity, &ctx).await }).await;
	}
	ctx.pool.wait().await;

	// Phase 2: resource transfer, deduplicated across the whole run.
	let mut resource_triples: BTreeSet<ResourceRef> = BTreeSet::new();
	for entity in &entities {
		let info = entity.cell.lock().await;
		for (name, revisions) in &info.resources {
			for revision in revisions {
				resource_triples.insert(ResourceRef {
					base_id: entity.base_id.clone(),
					name: name.clone(),
					revision: *revision,
				});
			}
		}
	}
	for resource in &resource_triples {
		let resource = resource.clone();
		let ctx = ctx.clone_refs();
		ctx.pool.spawn(async move {
			transfer_resource(&resource, &ctx).await;
		})
		.await;
	}
	ctx.pool.wait().await;

	// Phase 3: charm publish.
	for entity in &charms {
		let entity = entity.clone();
		let ctx = ctx.clone_refs();
		ctx.pool.spawn(async move {
			let ok = publish_entity(&entity, &ctx).await;
			if ok {
				entity.cell.lock().await.synced = true;
			}
		})
		.await;
	}
	ctx.pool.wait().await;

	// Phase 4: bundle transfer + publish.
	for entity in &bundles {
		let entity = entity.clone();
		let ctx = ctx.clone_refs();
		ctx.pool.spawn(async move {
			transfer_entity(&entity, &ctx).await;
			let ok = publish_entity(&entity, &ctx).await;
			if ok {
				entity.cell.lock().await.synced = true;
			}
		})
		.await;
	}
	ctx.pool.wait().await;

	// Phase 5: permission reconcile, once per base.
	let mut representative: BTreeMap<String, String> = BTreeMap::new();
	for entity in &entities {
		representative.entry(entity.base_id.clone()).or_insert_with(|| entity.id.to_string());
	}
	for (base_id, representative_id) in representative {
		let ctx = ctx.clone_refs();
		ctx.pool.spawn(async move { reconcile_perms(&base_id, &representative_id, &ctx).await }).await;
	}
	ctx.pool.wait().await;

	// `charms`/`bundles` hold clones of the same `Arc<Mutex<EntityInfo>>`
	// cells as `entities`; drop them so the unwrap below sees a unique owner.
	drop(charms);
	drop(bundles);

	let mut result: BTreeMap<String, WhitelistBaseEntity> = BTreeMap::new();
	for entity in entities {
		let info = Arc::try_unwrap(entity.cell).expect("no task outlives run_phases").into_inner();
		let key = info.id.to_string();
		let base =
			result.entry(entity.base_id.clone()).or_insert_with(|| WhitelistBaseEntity {
				base_id: entity.base_id.clone(),
				entities: BTreeMap::new(),
			});
		base.entities.insert(key, info);
	}
	(result, resource_triples.len())
}

impl SchedulerContext {
	fn clone_refs(&self) -> SchedulerContext {
		SchedulerContext {
			src: self.src.clone(),
			dest: self.dest.clone(),
			pool: self.pool.clone(),
			disk: self.disk.clone(),
			errors: self.errors.clone(),
			permission_owner: self.permission_owner.clone(),
		}
	}
}

/// SPEC_FULL.md §4.6.
async fn transfer_entity(entity: &ResolvedEntity, ctx: &SchedulerContext) {
	let id_string = entity.id.to_string();
	match ctx.dest.entity_info(ChannelSelector::NoChannel, &id_string).await {
		Ok(dest_entity) => reconcile_existing(entity, dest_entity, ctx).await,
		Err(e) if e.is_not_found() => {
			let (hash, archive_size, promulgated_rev, channels) = {
				let info = entity.cell.lock().await;
				let promulgated_rev = info.promulgated_id.as_ref().map(|p| p.revision).unwrap_or(-1);
				let channels: Vec<Channel> = info.channels.keys().copied().collect();
				(info.hash.clone(), info.archive_size, promulgated_rev, channels)
			};

			let src = ctx.src.clone();
			let fetch_id = id_string.clone();
			let reopener = Reopener::new(move || {
				let src = src.clone();
				let fetch_id = fetch_id.clone();
				async move {
					let (stream, _size) =
						src.get_archive(&fetch_id).await.map_err(std::io::Error::other)?;
					Ok(stream)
				}
			});

			if let Err(err) = ctx
				.dest
				.put_archive(&id_string, Box::new(reopener), &hash, archive_size, promulgated_rev, &channels)
				.await
			{
				ctx.errors.record(format!("failed to copy archive for {}: {}", id_string, err));
				return;
			}
			entity.cell.lock().await.archive_copied = true;

			let extra_info: BTreeMap<String, Option<serde_json::Value>> = {
				let info = entity.cell.lock().await;
				info.extra_info.iter().map(|(k, v)| (k.clone(), Some(v.clone()))).collect()
			};
			if let Err(err) = ctx.dest.put_extra_info(&id_string, &extra_info).await {
				ctx.errors.record(format!("failed to set extra-info for {}: {}", id_string, err));
			}
		}
		Err(e) => {
			ctx.errors.record(format!("failed to query destination for {}: {}", id_string, e));
		}
	}
}

/// SPEC_FULL.md §4.6, `reconcile_existing`.
async fn reconcile_existing(entity: &ResolvedEntity, dest_entity: EntityInfo, ctx: &SchedulerContext) {
	let id_string = entity.id.to_string();
	let (archive_size, hash, extra_info) = {
		let info = entity.cell.lock().await;
		(info.archive_size, info.hash.clone(), info.extra_info.clone())
	};

	if dest_entity.archive_size != archive_size || dest_entity.hash != hash {
		ctx.errors.record(format!(
			"{} already exists at destination with a different archive; not overwriting",
			id_string
		));
		return;
	}

	let mut diff: BTreeMap<String, Option<serde_json::Value>> = BTreeMap::new();
	for (key, value) in &extra_info {
		if dest_entity.extra_info.get(key) != Some(value) {
			diff.insert(key.clone(), Some(value.clone()));
		}
	}
	for key in dest_entity.extra_info.keys() {
		if !extra_info.contains_key(key) {
			diff.insert(key.clone(), None);
		}
	}
	if !diff.is_empty() {
		if let Err(err) = ctx.dest.put_extra_info(&id_string, &diff).await {
			ctx.errors.record(format!("failed to update extra-info for {}: {}", id_string, err));
		}
	}

	publish_entity(entity, ctx).await;
}

/// SPEC_FULL.md §4.7. Returns whether every current-channel publish call
/// succeeded; the caller decides whether that marks the entity `synced`.
async fn publish_entity(entity: &ResolvedEntity, ctx: &SchedulerContext) -> bool {
	let (id_string, current_channels, published_resources) = {
		let info = entity.cell.lock().await;
		(info.id.to_string(), info.current_channels(), info.published_resources.clone())
	};

	let mut all_ok = true;
	for channel in current_channels {
		let resources = published_resources.get(&channel).cloned().unwrap_or_default();
		if let Err(err) = ctx.dest.publish(&id_string, &[channel], &resources).await {
			ctx.errors.record(format!("failed to publish {} on {}: {}", id_string, channel, err));
			all_ok = false;
		}
	}
	all_ok
}

/// SPEC_FULL.md §4.8.
async fn transfer_resource(resource: &ResourceRef, ctx: &SchedulerContext) {
	match ctx.dest.resource_info(&resource.base_id, &resource.name, resource.revision).await {
		Ok(()) => return,
		Err(e) if e.is_not_found() => {}
		Err(e) => {
			ctx.errors.record(format!(
				"failed to query destination resource {}/{}@{}: {}",
				resource.base_id, resource.name, resource.revision, e
			));
			return;
		}
	}

	let (stream, size) = match ctx.src.get_resource(&resource.base_id, &resource.name, resource.revision).await {
		Ok(v) => v,
		Err(e) => {
			ctx.errors.record(format!(
				"failed to fetch source resource {}/{}@{}: {}",
				resource.base_id, resource.name, resource.revision, e
			));
			return;
		}
	};

	let scratch = match ctx.disk.get_disk(size).await {
		Ok(s) => s,
		Err(e) => {
			ctx.errors.record(format!(
				"disk budget exceeded for resource {}/{}@{}: {}",
				resource.base_id, resource.name, resource.revision, e
			));
			return;
		}
	};

	let mut file = match tokio::fs::File::create(scratch.path()).await {
		Ok(f) => f,
		Err(e) => {
			ctx.errors.record(format!("failed to open scratch file for {}: {}", resource.name, e));
			return;
		}
	};
	let mut limited = stream.take(size + 1);
	let copied = match tokio::io::copy(&mut limited, &mut file).await {
		Ok(n) => n,
		Err(e) => {
			ctx.errors.record(format!(
				"failed to buffer resource {}/{}@{}: {}",
				resource.base_id, resource.name, resource.revision, e
			));
			return;
		}
	};
	if copied != size {
		ctx.errors.record(format!(
			"resource {}/{}@{} had unexpected size: wanted {} bytes, got {}",
			resource.base_id, resource.name, resource.revision, size, copied
		));
		return;
	}

	let path = scratch.path().to_path_buf();
	let reopener = Reopener::new(move || {
		let path = path.clone();
		async move {
			let file = tokio::fs::File::open(&path).await?;
			Ok(Box::new(file) as Box<dyn AsyncRead + Send + Unpin>)
		}
	});
	if let Err(err) = ctx
		.dest
		.put_resource(&resource.base_id, &resource.name, resource.revision, Box::new(reopener), size)
		.await
	{
		ctx.errors.record(format!(
			"failed to upload resource {}/{}@{}: {}",
			resource.base_id, resource.name, resource.revision, err
		));
	}
}

/// SPEC_FULL.md §4.9.
async fn reconcile_perms(base_id: &str, representative_id: &str, ctx: &SchedulerContext) {
	let base_entity = match ctx.dest.get_base_entity(base_id).await {
		Ok(b) => b,
		Err(e) => {
			ctx.errors.record(format!("failed to fetch permissions for {}: {}", base_id, e));
			return;
		}
	};

	let owner = EntityId::parse(base_id).map(|id| id.user).unwrap_or_default();
	let default = Permissions::owner_only(&owner);
	let customized = base_entity.channels.values().any(|perms| *perms != default);
	if customized {
		return;
	}

	let write = ctx.permission_owner.clone().into_iter().collect::<Vec<_>>();
	for channel in Channel::ALL {
		let perms = Permissions { read: vec!["everyone".to_string()], write: write.clone() };
		if let Err(err) = ctx.dest.set_perm(representative_id, channel, &perms).await {
			ctx.errors.record(format!("failed to set permissions for {} on {}: {}", base_id, channel, err));
			break;
		}
	}
}


// vim: ts=4
