//! Top-level entry point wiring the resolver, scheduler, and statistics
//! aggregator together around one `Config` (SPEC_FULL.md §2, §4.11).

use crate::config::Config;
use crate::disk::{DiskLimitMode, DiskLimiter};
use crate::error::IngestError;
use crate::pool::Pool;
use crate::registry::{DryRunRegistryClient, RegistryClient};
use crate::scheduler::{run_phases, SchedulerContext};
use crate::stats::{aggregate, ErrorSink, IngestStats};
use crate::whitelist::{parse_whitelist_file, resolve_whitelist};
use std::sync::Arc;

/// Run one full ingestion: resolve the whitelist against `src`, replicate
/// everything whitelisted into `dest`, and return the run's statistics.
///
/// Per-entity and per-resource failures are recorded into `stats.errors`
/// rather than propagated (SPEC_FULL.md §7); this only returns `Err` for
/// failures that abort before the pipeline starts.
pub async fn run_ingest(
	config: &Config,
	src: Arc<dyn RegistryClient>,
	dest: Arc<dyn RegistryClient>,
) -> Result<IngestStats, IngestError> {
	let entries = parse_whitelist_file(&config.whitelist).await?;

	let pool = Pool::new(config.parallelism);
	let errors = ErrorSink::new();
	let disk_mode = if config.disk_hard_limit { DiskLimitMode::Hard } else { DiskLimitMode::Soft };
	let disk = DiskLimiter::new(config.max_disk, disk_mode, config.state_dir.join("scratch"));

	let dest: Arc<dyn RegistryClient> =
		if config.dry_run { Arc::new(DryRunRegistryClient::new(dest)) } else { dest };

	crate::logging::info!(entries = entries.len(), "resolving whitelist");
	let bases = resolve_whitelist(entries, src.clone(), &pool, &errors).await;

	let ctx = SchedulerContext {
		src,
		dest,
		pool,
		disk,
		errors: errors.clone(),
		permission_owner: config.permission_owner.clone(),
	};
	let (bases, resource_triples_attempted) = run_phases(bases, &ctx).await;

	let stats = aggregate(&bases, resource_triples_attempted, errors.into_errors());
	crate::logging::info!(
		base_entity_count = stats.base_entity_count,
		entity_count = stats.entity_count,
		failed_entity_count = stats.failed_entity_count,
		archives_copied_count = stats.archives_copied_count,
		"ingest run complete"
	);
	Ok(stats)
}

// vim: ts=4
