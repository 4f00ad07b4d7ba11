//! Registry client contract consumed by the ingestion core (SPEC_FULL.md §6.1).
//!
//! The core depends only on [`RegistryClient`]; it never knows whether it is
//! talking to [`http::HttpRegistryClient`] or an in-memory test double.

pub mod fake;
pub mod http;

use crate::error::RegistryError;
use crate::model::{Channel, EntityInfo, Permissions};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::io::{AsyncRead, AsyncSeek};

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Channel selector for [`RegistryClient::entity_info`]. `NoChannel` asks the
/// server to pick whichever channel the caller is authorized on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelSelector {
	Channel(Channel),
	NoChannel,
}

/// A byte stream plus its declared length, as returned by `get_archive`/`get_resource`.
pub type SizedStream = (Box<dyn AsyncRead + Send + Unpin>, u64);

/// A seekable-to-start reader, the contract `put_archive` requires so the
/// server may retry an upload (SPEC_FULL.md §4.3).
pub trait SeekableReader: AsyncRead + AsyncSeek + Send + Unpin {}
impl<T: AsyncRead + AsyncSeek + Send + Unpin> SeekableReader for T {}

/// Destination-side permission state for a base entity (SPEC_FULL.md §3).
#[derive(Debug, Clone, Default)]
pub struct BaseEntityPermissions {
	pub channels: BTreeMap<Channel, Permissions>,
}

/// The operations the ingestion core needs from either registry side.
/// Implementations must be safe for concurrent use from many tasks.
#[async_trait]
pub trait RegistryClient: Send + Sync {
	/// Look up metadata on the given channel. A revisionless id resolves to
	/// the current revision of that channel.
	async fn entity_info(&self, channel: ChannelSelector, id: &str) -> RegistryResult<EntityInfo>;

	/// Permission map for the base entity.
	async fn get_base_entity(&self, base_id: &str) -> RegistryResult<BaseEntityPermissions>;

	/// One-shot byte stream of the entity archive.
	async fn get_archive(&self, id: &str) -> RegistryResult<SizedStream>;

	/// Upload an archive. `promulgated_rev = -1` means "not promulgated". The
	/// uploaded revision is pre-published into `channels` with `current=false`.
	async fn put_archive(
		&self,
		id: &str,
		reader: Box<dyn SeekableReader>,
		hash: &str,
		size: u64,
		promulgated_rev: i64,
		channels: &[Channel],
	) -> RegistryResult<()>;

	/// Merge metadata; a `None` value deletes that key.
	async fn put_extra_info(
		&self,
		id: &str,
		extra_info: &BTreeMap<String, Option<serde_json::Value>>,
	) -> RegistryResult<()>;

	/// Replace permissions for one channel of a base entity.
	async fn set_perm(&self, id: &str, channel: Channel, perms: &Permissions) -> RegistryResult<()>;

	/// Mark the revision current for each channel, binding the given
	/// resource-name -> revision map.
	async fn publish(
		&self,
		id: &str,
		channels: &[Channel],
		resources: &BTreeMap<String, i64>,
	) -> RegistryResult<()>;

	async fn resource_info(&self, id: &str, name: &str, revision: i64) -> RegistryResult<()>;

	async fn get_resource(&self, id: &str, name: &str, revision: i64) -> RegistryResult<SizedStream>;

	async fn put_resource(
		&self,
		id: &str,
		name: &str,
		revision: i64,
		reader: Box<dyn SeekableReader>,
		size: u64,
	) -> RegistryResult<()>;
}

/// Wraps a [`RegistryClient`] so that every mutating call is skipped while
/// reads still pass through, for `Config::dry_run` (SPEC_FULL.md §4.11).
pub struct DryRunRegistryClient {
	inner: std::sync::Arc<dyn RegistryClient>,
}

impl DryRunRegistryClient {
	pub fn new(inner: std::sync::Arc<dyn RegistryClient>) -> Self {
		DryRunRegistryClient { inner }
	}
}

#[async_trait]
impl RegistryClient for DryRunRegistryClient {
	async fn entity_info(&self, channel: ChannelSelector, id: &str) -> RegistryResult<EntityInfo> {
		self.inner.entity_info(channel, id).await
	}

	async fn get_base_entity(&self, base_id: &str) -> RegistryResult<BaseEntityPermissions> {
		self.inner.get_base_entity(base_id).await
	}

	async fn get_archive(&self, id: &str) -> RegistryResult<SizedStream> {
		self.inner.get_archive(id).await
	}

	async fn put_archive(
		&self,
		_id: &str,
		_reader: Box<dyn SeekableReader>,
		_hash: &str,
		_size: u64,
		_promulgated_rev: i64,
		_channels: &[Channel],
	) -> RegistryResult<()> {
		Ok(())
	}

	async fn put_extra_info(
		&self,
		_id: &str,
		_extra_info: &BTreeMap<String, Option<serde_json::Value>>,
	) -> RegistryResult<()> {
		Ok(())
	}

	async fn set_perm(&self, _id: &str, _channel: Channel, _perms: &Permissions) -> RegistryResult<()> {
		Ok(())
	}

	async fn publish(
		&self,
		_id: &str,
		_channels: &[Channel],
		_resources: &BTreeMap<String, i64>,
	) -> RegistryResult<()> {
		Ok(())
	}

	async fn resource_info(&self, id: &str, name: &str, revision: i64) -> RegistryResult<()> {
		self.inner.resource_info(id, name, revision).await
	}

	async fn get_resource(&self, id: &str, name: &str, revision: i64) -> RegistryResult<SizedStream> {
		self.inner.get_resource(id, name, revision).await
	}

	async fn put_resource(
		&self,
		_id: &str,
		_name: &str,
		_revision: i64,
		_reader: Box<dyn SeekableReader>,
		_size: u64,
	) -> RegistryResult<()> {
		Ok(())
	}
}

// vim: ts=4
