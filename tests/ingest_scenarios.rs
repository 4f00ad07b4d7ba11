//! End-to-end ingestion scenarios against the in-memory fake registry.
//!
//! Exercises `run_ingest` the way `ingestctl`'s own CLI would call it: a real
//! whitelist file on disk, a `Config`, and two `FakeRegistryClient`s standing
//! in for source and destination.

use ingestctl::config::Config;
use ingestctl::model::{BundleMember, Channel};
use ingestctl::registry::fake::FakeRegistryClient;
use ingestctl::registry::{ChannelSelector, RegistryClient};
use ingestctl::run_ingest;
use ingestctl::EntityId;
use ingestctl::EntityInfo;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;

fn entity(id: &str, channels: &[Channel], archive_size: u64, hash: &str) -> EntityInfo {
	EntityInfo {
		id: EntityId::parse(id).unwrap(),
		promulgated_id: None,
		channels: channels.iter().map(|c| (*c, true)).collect(),
		archive_size,
		hash: hash.to_string(),
		extra_info: BTreeMap::new(),
		common_info: BTreeMap::new(),
		resources: BTreeMap::new(),
		published_resources: BTreeMap::new(),
		bundle_charms: Vec::new(),
		synced: false,
		archive_copied: false,
	}
}

fn config(dir: &TempDir, whitelist: &str) -> Config {
	let whitelist_path = dir.path().join("whitelist.txt");
	std::fs::File::create(&whitelist_path).unwrap().write_all(whitelist.as_bytes()).unwrap();

	Config {
		whitelist: whitelist_path,
		source: "fake://source".to_string(),
		dest: "fake://dest".to_string(),
		parallelism: 4,
		max_disk: 0,
		disk_hard_limit: false,
		state_dir: dir.path().join("state"),
		permission_owner: None,
		dry_run: false,
	}
}

#[tokio::test]
async fn copy_one() {
	let dir = TempDir::new().unwrap();
	let src = FakeRegistryClient::new();
	let mut wordpress = entity("~charmers/wordpress-4", &[Channel::Stable], 5, "deadbeef");
	wordpress.extra_info = BTreeMap::from([
		("x".to_string(), serde_json::json!(45)),
		("y".to_string(), serde_json::json!("hello")),
	]);
	src.seed(wordpress, b"hello".to_vec());
	let dest = FakeRegistryClient::new();

	let cfg = config(&dir, "~charmers/wordpress stable\n");
	let stats = run_ingest(&cfg, Arc::new(src), Arc::new(dest)).await.unwrap();

	assert_eq!(stats.base_entity_count, 1);
	assert_eq!(stats.entity_count, 1);
	assert_eq!(stats.archives_copied_count, 1);
	assert_eq!(stats.failed_entity_count, 0);
	assert!(stats.errors.is_empty());
}

#[tokio::test]
async fn already_exists_with_different_extra_info_reconciles_metadata_only() {
	let dir = TempDir::new().unwrap();
	let src = FakeRegistryClient::new();
	let mut source_info = entity("~charmers/wordpress-4", &[Channel::Stable], 5, "deadbeef");
	source_info.extra_info = BTreeMap::from([
		("x".to_string(), serde_json::json!(45)),
		("y".to_string(), serde_json::json!("hello")),
	]);
	src.seed(source_info, b"hello".to_vec());

	let dest = Arc::new(FakeRegistryClient::new());
	let mut dest_info = entity("~charmers/wordpress-4", &[], 5, "deadbeef");
	dest_info.extra_info = BTreeMap::from([
		("x".to_string(), serde_json::json!(10)),
		("z".to_string(), serde_json::json!("other")),
	]);
	dest.seed(dest_info, b"hello".to_vec());

	let cfg = config(&dir, "~charmers/wordpress stable\n");
	let stats = run_ingest(&cfg, Arc::new(src), dest.clone()).await.unwrap();

	assert_eq!(stats.archives_copied_count, 0);
	assert_eq!(stats.failed_entity_count, 0);

	let reconciled = dest
		.entity_info(ChannelSelector::NoChannel, "~charmers/wordpress-4")
		.await
		.unwrap();
	assert_eq!(
		reconciled.extra_info,
		BTreeMap::from([
			("x".to_string(), serde_json::json!(45)),
			("y".to_string(), serde_json::json!("hello")),
		])
	);
	assert!(!reconciled.extra_info.contains_key("z"));
}

#[tokio::test]
async fn entity_not_available_in_channel_records_a_non_fatal_error() {
	let dir = TempDir::new().unwrap();
	let src = FakeRegistryClient::new();
	src.seed(entity("~charmers/wordpress-4", &[Channel::Candidate], 5, "deadbeef"), b"hello".to_vec());
	let dest = FakeRegistryClient::new();

	let cfg = config(&dir, "~charmers/wordpress candidate stable\n");
	let stats = run_ingest(&cfg, Arc::new(src), Arc::new(dest)).await.unwrap();

	assert_eq!(stats.entity_count, 1);
	assert!(stats
		.errors
		.iter()
		.any(|e| e == "entity \"~charmers/wordpress\" is not available in stable channel"));
}

#[tokio::test]
async fn bundle_pulls_in_its_member_charms() {
	let dir = TempDir::new().unwrap();
	let src = FakeRegistryClient::new();

	let mut bundle = entity("~charmers/bundle/fun-3", &[Channel::Stable], 14, "bundlehash");
	bundle.bundle_charms = vec![
		BundleMember { charm_id: EntityId::parse("~charmers/wordpress-4").unwrap(), resources: BTreeMap::new() },
		BundleMember { charm_id: EntityId::parse("~other/foo-3").unwrap(), resources: BTreeMap::new() },
	];
	src.seed(bundle, b"bundle-archive".to_vec());
	src.seed(entity("~charmers/wordpress-4", &[Channel::Stable], 5, "deadbeef"), b"hello".to_vec());
	src.seed(entity("~other/foo-3", &[Channel::Stable], 3, "f00d"), b"foo".to_vec());

	let dest = FakeRegistryClient::new();
	let cfg = config(&dir, "~charmers/bundle/fun stable\n");
	let stats = run_ingest(&cfg, Arc::new(src), Arc::new(dest)).await.unwrap();

	assert_eq!(stats.base_entity_count, 3);
	assert_eq!(stats.archives_copied_count, 3);
	assert_eq!(stats.failed_entity_count, 0);
}

#[tokio::test]
async fn rerunning_an_already_synced_destination_copies_nothing() {
	let dir = TempDir::new().unwrap();
	let src = FakeRegistryClient::new();
	src.seed(entity("~charmers/wordpress-4", &[Channel::Stable], 5, "deadbeef"), b"hello".to_vec());
	let dest = Arc::new(FakeRegistryClient::new());

	let cfg = config(&dir, "~charmers/wordpress stable\n");
	let first = run_ingest(&cfg, Arc::new(src), dest.clone()).await.unwrap();
	assert_eq!(first.archives_copied_count, 1);

	let src_again = FakeRegistryClient::new();
	src_again.seed(entity("~charmers/wordpress-4", &[Channel::Stable], 5, "deadbeef"), b"hello".to_vec());
	let second = run_ingest(&cfg, Arc::new(src_again), dest).await.unwrap();
	assert_eq!(second.archives_copied_count, 0);
}

/// SPEC_FULL.md §8 scenario 6: a bundle pins resource revisions on its
/// members, which union with whatever the source reports as published on
/// the queried channel, and the resource-transfer phase actually has to
/// move those bytes through the fake registry.
#[tokio::test]
async fn bundle_with_resources_transfers_every_pinned_revision() {
	let dir = TempDir::new().unwrap();
	let src = FakeRegistryClient::new();

	let mut wordpress = entity("~charmers/wordpress-4", &[Channel::Stable], 5, "deadbeef");
	// What the source server reports as currently published on `stable`.
	wordpress.resources =
		BTreeMap::from([("w1".to_string(), vec![2]), ("w2".to_string(), vec![5])]);
	src.seed(wordpress, b"hello".to_vec());
	src.seed_resource("~charmers/wordpress", "w1", 2, b"w1-rev2".to_vec());
	src.seed_resource("~charmers/wordpress", "w1", 3, b"w1-rev3".to_vec());
	src.seed_resource("~charmers/wordpress", "w2", 4, b"w2-rev4".to_vec());
	src.seed_resource("~charmers/wordpress", "w2", 5, b"w2-rev5".to_vec());

	let mut bundle = entity("~charmers/bundle/fun-3", &[Channel::Stable], 14, "bundlehash");
	bundle.bundle_charms = vec![BundleMember {
		charm_id: EntityId::parse("~charmers/wordpress-4").unwrap(),
		resources: BTreeMap::from([("w1".to_string(), 3), ("w2".to_string(), 4)]),
	}];
	src.seed(bundle, b"bundle-archive".to_vec());

	let dest = Arc::new(FakeRegistryClient::new());
	let cfg = config(&dir, "~charmers/bundle/fun stable\n");
	let stats = run_ingest(&cfg, Arc::new(src), dest.clone()).await.unwrap();

	assert_eq!(stats.base_entity_count, 2);
	assert_eq!(stats.failed_entity_count, 0);
	// w1@{2,3} + w2@{4,5}: the union of source-published and bundle-pinned revisions.
	assert_eq!(stats.resource_transfer_count, 4);
	assert!(stats.errors.is_empty());

	for (name, revision) in [("w1", 2), ("w1", 3), ("w2", 4), ("w2", 5)] {
		dest.resource_info("~charmers/wordpress", name, revision)
			.await
			.unwrap_or_else(|_| panic!("resource {}@{} missing at destination", name, revision));
	}
}
