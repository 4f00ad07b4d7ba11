//! HTTP-backed [`RegistryClient`]. The wire format of a real artifact
//! registry is out of scope; this adapter exists to show the shape of the
//! trait's single non-test implementation and to give the CLI something to
//! wire in (SPEC_FULL.md §2, §9).

use super::{BaseEntityPermissions, ChannelSelector, RegistryClient, RegistryResult, SeekableReader, SizedStream};
use crate::error::RegistryError;
use crate::model::{Channel, EntityInfo, Permissions};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Cursor;
use tokio::io::AsyncReadExt;

/// Talks to one registry base URL over HTTP.
pub struct HttpRegistryClient {
	base_url: String,
	client: reqwest::Client,
}

impl HttpRegistryClient {
	pub fn new(base_url: impl Into<String>) -> Self {
		HttpRegistryClient { base_url: base_url.into(), client: reqwest::Client::new() }
	}

	fn url(&self, path: &str) -> String {
		format!("{}{}", self.base_url.trim_end_matches('/'), path)
	}
}

#[derive(Deserialize)]
struct WireEntityInfo {
	#[serde(flatten)]
	_unused: BTreeMap<String, serde_json::Value>,
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
	async fn entity_info(&self, channel: ChannelSelector, id: &str) -> RegistryResult<EntityInfo> {
		let channel_param = match channel {
			ChannelSelector::NoChannel => String::new(),
			ChannelSelector::Channel(c) => format!("?channel={}", c),
		};
		let response = self
			.client
			.get(self.url(&format!("/v1/entity/{}/meta{}", id, channel_param)))
			.send()
			.await
			.map_err(RegistryError::transport)?;
		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Err(RegistryError::NotFound);
		}
		let _wire: WireEntityInfo =
			response.error_for_status().map_err(RegistryError::transport)?.json().await.map_err(RegistryError::transport)?;
		// The registry-specific JSON shape is out of scope; a real adapter
		// maps `_wire` into `EntityInfo` here.
		Err(RegistryError::transport(std::io::Error::new(
			std::io::ErrorKind::Unsupported,
			"HTTP wire format not implemented",
		)))
	}

	async fn get_base_entity(&self, base_id: &str) -> RegistryResult<BaseEntityPermissions> {
		let response = self
			.client
			.get(self.url(&format!("/v1/{}/meta/perm", base_id)))
			.send()
			.await
			.map_err(RegistryError::transport)?;
		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Err(RegistryError::NotFound);
		}
		Err(RegistryError::transport(std::io::Error::new(
			std::io::ErrorKind::Unsupported,
			"HTTP wire format not implemented",
		)))
	}

	async fn get_archive(&self, id: &str) -> RegistryResult<SizedStream> {
		let response =
			self.client.get(self.url(&format!("/v1/{}/archive", id))).send().await.map_err(RegistryError::transport)?;
		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Err(RegistryError::NotFound);
		}
		let response = response.error_for_status().map_err(RegistryError::transport)?;
		let bytes = response.bytes().await.map_err(RegistryError::transport)?;
		let size = bytes.len() as u64;
		Ok((Box::new(Cursor::new(bytes.to_vec())), size))
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
		let mut body = Vec::new();
		reader.read_to_end(&mut body).await.map_err(RegistryError::transport)?;
		let channel_list = channels.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(",");
		let response = self
			.client
			.post(self.url(&format!("/v1/{}/archive", id)))
			.header("Content-Length", size)
			.header("X-Hash", hash)
			.header("X-Promulgated-Revision", promulgated_rev)
			.header("X-Channels", channel_list)
			.body(body)
			.send()
			.await
			.map_err(RegistryError::transport)?;
		if response.status() == reqwest::StatusCode::CONFLICT {
			return Err(RegistryError::Conflict { message: format!("{} already exists", id) });
		}
		response.error_for_status().map_err(RegistryError::transport)?;
		Ok(())
	}

	async fn put_extra_info(
		&self,
		id: &str,
		extra_info: &BTreeMap<String, Option<serde_json::Value>>,
	) -> RegistryResult<()> {
		self.client
			.put(self.url(&format!("/v1/{}/meta/extra-info", id)))
			.json(extra_info)
			.send()
			.await
			.map_err(RegistryError::transport)?
			.error_for_status()
			.map_err(RegistryError::transport)?;
		Ok(())
	}

	async fn set_perm(&self, id: &str, channel: Channel, perms: &Permissions) -> RegistryResult<()> {
		self.client
			.put(self.url(&format!("/v1/{}/meta/perm/{}", id, channel)))
			.json(perms)
			.send()
			.await
			.map_err(RegistryError::transport)?
			.error_for_status()
			.map_err(RegistryError::transport)?;
		Ok(())
	}

	async fn publish(
		&self,
		id: &str,
		channels: &[Channel],
		resources: &BTreeMap<String, i64>,
	) -> RegistryResult<()> {
		let body = serde_json::json!({
			"channels": channels,
			"resources": resources,
		});
		self.client
			.post(self.url(&format!("/v1/{}/publish", id)))
			.json(&body)
			.send()
			.await
			.map_err(RegistryError::transport)?
			.error_for_status()
			.map_err(RegistryError::transport)?;
		Ok(())
	}

	async fn resource_info(&self, id: &str, name: &str, revision: i64) -> RegistryResult<()> {
		let response = self
			.client
			.get(self.url(&format!("/v1/{}/resource/{}/{}", id, name, revision)))
			.send()
			.await
			.map_err(RegistryError::transport)?;
		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Err(RegistryError::NotFound);
		}
		response.error_for_status().map_err(RegistryError::transport)?;
		Ok(())
	}

	async fn get_resource(&self, id: &str, name: &str, revision: i64) -> RegistryResult<SizedStream> {
		let response = self
			.client
			.get(self.url(&format!("/v1/{}/resource/{}/{}/content", id, name, revision)))
			.send()
			.await
			.map_err(RegistryError::transport)?;
		if response.status() == reqwest::StatusCode::NOT_FOUND {
			return Err(RegistryError::NotFound);
		}
		let response = response.error_for_status().map_err(RegistryError::transport)?;
		let bytes = response.bytes().await.map_err(RegistryError::transport)?;
		let size = bytes.len() as u64;
		Ok((Box::new(Cursor::new(bytes.to_vec())), size))
	}

	async fn put_resource(
		&self,
		id: &str,
		name: &str,
		revision: i64,
		mut reader: Box<dyn SeekableReader>,
		size: u64,
	) -> RegistryResult<()> {
		let mut body = Vec::new();
		reader.read_to_end(&mut body).await.map_err(RegistryError::transport)?;
		self.client
			.post(self.url(&format!("/v1/{}/resource/{}/{}/content", id, name, revision)))
			.header("Content-Length", size)
			.body(body)
			.send()
			.await
			.map_err(RegistryError::transport)?
			.error_for_status()
			.map_err(RegistryError::transport)?;
		Ok(())
	}
}

// vim: ts=4
