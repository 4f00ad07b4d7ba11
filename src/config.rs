//! Layered configuration for an ingest run (SPEC_FULL.md §4.11).
//!
//! Resolution order, lowest to highest priority: built-in defaults,
//! `$INGESTCTL_DIR/config.toml` if present, `INGESTCTL_*` environment
//! variables, then CLI flags.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	/// Path to the whitelist text file (SPEC_FULL.md §6.2).
	pub whitelist: PathBuf,
	/// Source registry base URL.
	pub source: String,
	/// Destination registry base URL.
	pub dest: String,
	/// Worker-pool capacity: in-flight registry requests.
	pub parallelism: usize,
	/// Disk budget in bytes for scratch files. `0` means unlimited.
	pub max_disk: u64,
	/// When `max_disk` is exceeded by a single resource: reject it instead
	/// of letting it run alone against the full budget.
	pub disk_hard_limit: bool,
	/// State directory. Unread and unwritten today; reserved for a future
	/// on-disk cache (SPEC_FULL.md §6.3, §9).
	pub state_dir: PathBuf,
	/// Principal granted `write` when permissions are reconciled onto their
	/// defaults (SPEC_FULL.md §4.9). `None` leaves `write` empty.
	pub permission_owner: Option<String>,
	/// Resolve everything and produce stats, but skip every mutating
	/// registry call.
	pub dry_run: bool,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			whitelist: PathBuf::new(),
			source: String::new(),
			dest: String::new(),
			parallelism: 20,
			max_disk: 0,
			disk_hard_limit: false,
			state_dir: default_state_dir(),
			permission_owner: None,
			dry_run: false,
		}
	}
}

fn default_state_dir() -> PathBuf {
	std::env::var("HOME")
		.ok()
		.map(|home| PathBuf::from(home).join(".ingestctl"))
		.unwrap_or_else(|| PathBuf::from(".ingestctl"))
}

/// Flag overrides parsed from the CLI, applied last (SPEC_FULL.md §4.12).
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
	pub whitelist: Option<PathBuf>,
	pub source: Option<String>,
	pub dest: Option<String>,
	pub parallelism: Option<usize>,
	pub max_disk: Option<u64>,
	pub disk_hard_limit: bool,
	pub dry_run: bool,
}

impl Config {
	/// Build a `Config` by layering the config file, environment, and CLI
	/// overrides on top of the defaults, then validate the result.
	pub fn resolve(cli: CliOverrides) -> Result<Config, ValidationError> {
		let mut config = Config::default();
		config.merge_file()?;
		config.merge_env();
		config.merge_cli(cli);
		config.validate()?;
		Ok(config)
	}

	fn config_file_path() -> Option<PathBuf> {
		std::env::var("INGESTCTL_DIR").ok().map(|dir| PathBuf::from(dir).join("config.toml"))
	}

	fn merge_file(&mut self) -> Result<(), ValidationError> {
		let Some(path) = Self::config_file_path() else { return Ok(()) };
		if !path.exists() {
			return Ok(());
		}
		let text = std::fs::read_to_string(&path)
			.map_err(|e| ValidationError::InvalidConfig { message: format!("reading {}: {}", path.display(), e) })?;
		let file_config: PartialConfig = toml::from_str(&text)
			.map_err(|e| ValidationError::InvalidConfig { message: format!("parsing {}: {}", path.display(), e) })?;
		file_config.apply_onto(self);
		Ok(())
	}

	fn merge_env(&mut self) {
		if let Ok(v) = std::env::var("INGESTCTL_WHITELIST") {
			self.whitelist = PathBuf::from(v);
		}
		if let Ok(v) = std::env::var("INGESTCTL_SOURCE") {
			self.source = v;
		}
		if let Ok(v) = std::env::var("INGESTCTL_DEST") {
			self.dest = v;
		}
		if let Ok(v) = std::env::var("INGESTCTL_PARALLELISM") {
			if let Ok(n) = v.parse() {
				self.parallelism = n;
			}
		}
		if let Ok(v) = std::env::var("INGESTCTL_MAX_DISK") {
			if let Ok(n) = v.parse() {
				self.max_disk = n;
			}
		}
		if let Ok(v) = std::env::var("INGESTCTL_DISK_HARD_LIMIT") {
			self.disk_hard_limit = v == "1" || v.eq_ignore_ascii_case("true");
		}
		if let Ok(v) = std::env::var("INGESTCTL_DRY_RUN") {
			self.dry_run = v == "1" || v.eq_ignore_ascii_case("true");
		}
		if let Ok(v) = std::env::var("INGESTCTL_PERMISSION_OWNER") {
			self.permission_owner = Some(v);
		}
	}

	fn merge_cli(&mut self, cli: CliOverrides) {
		if let Some(whitelist) = cli.whitelist {
			self.whitelist = whitelist;
		}
		if let Some(source) = cli.source {
			self.source = source;
		}
		if let Some(dest) = cli.dest {
			self.dest = dest;
		}
		if let Some(parallelism) = cli.parallelism {
			self.parallelism = parallelism;
		}
		if let Some(max_disk) = cli.max_disk {
			self.max_disk = max_disk;
		}
		if cli.disk_hard_limit {
			self.disk_hard_limit = true;
		}
		if cli.dry_run {
			self.dry_run = true;
		}
	}

	fn validate(&self) -> Result<(), ValidationError> {
		if self.whitelist.as_os_str().is_empty() {
			return Err(ValidationError::InvalidConfig { message: "no whitelist file configured".to_string() });
		}
		if self.source.is_empty() || !self.source.contains("://") {
			return Err(ValidationError::InvalidConfig {
				message: format!("source registry URL {:?} is not a URL", self.source),
			});
		}
		if self.dest.is_empty() || !self.dest.contains("://") {
			return Err(ValidationError::InvalidConfig {
				message: format!("destination registry URL {:?} is not a URL", self.dest),
			});
		}
		if self.parallelism == 0 {
			return Err(ValidationError::InvalidConfig { message: "parallelism must be at least 1".to_string() });
		}
		Ok(())
	}
}

/// Mirrors [`Config`] but with every field optional, so a config file may
/// set only the keys it cares about.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PartialConfig {
	whitelist: Option<PathBuf>,
	source: Option<String>,
	dest: Option<String>,
	parallelism: Option<usize>,
	max_disk: Option<u64>,
	disk_hard_limit: Option<bool>,
	state_dir: Option<PathBuf>,
	permission_owner: Option<String>,
	dry_run: Option<bool>,
}

impl PartialConfig {
	fn apply_onto(self, config: &mut Config) {
		if let Some(v) = self.whitelist {
			config.whitelist = v;
		}
		if let Some(v) = self.source {
			config.source = v;
		}
		if let Some(v) = self.dest {
			config.dest = v;
		}
		if let Some(v) = self.parallelism {
			config.parallelism = v;
		}
		if let Some(v) = self.max_disk {
			config.max_disk = v;
		}
		if let Some(v) = self.disk_hard_limit {
			config.disk_hard_limit = v;
		}
		if let Some(v) = self.state_dir {
			config.state_dir = v;
		}
		if let Some(v) = self.permission_owner {
			config.permission_owner = Some(v);
		}
		if let Some(v) = self.dry_run {
			config.dry_run = v;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_unvalidated_but_sane() {
		let config = Config::default();
		assert_eq!(config.parallelism, 20);
		assert_eq!(config.max_disk, 0);
		assert!(!config.dry_run);
	}

	#[test]
	fn cli_overrides_win_over_defaults() {
		let cli = CliOverrides {
			whitelist: Some(PathBuf::from("/tmp/whitelist.txt")),
			source: Some("https://src.example".to_string()),
			dest: Some("https://dest.example".to_string()),
			parallelism: Some(5),
			max_disk: Some(1024),
			disk_hard_limit: true,
			dry_run: true,
		};
		// Isolated from the environment: no INGESTCTL_DIR/config.toml in test runs.
		std::env::remove_var("INGESTCTL_DIR");
		let config = Config::resolve(cli).unwrap();
		assert_eq!(config.whitelist, PathBuf::from("/tmp/whitelist.txt"));
		assert_eq!(config.parallelism, 5);
		assert!(config.disk_hard_limit);
		assert!(config.dry_run);
	}

	#[test]
	fn rejects_missing_whitelist() {
		std::env::remove_var("INGESTCTL_DIR");
		let cli = CliOverrides {
			source: Some("https://src.example".to_string()),
			dest: Some("https://dest.example".to_string()),
			..Default::default()
		};
		assert!(matches!(Config::resolve(cli), Err(ValidationError::InvalidConfig { .. })));
	}

	#[test]
	fn rejects_zero_parallelism() {
		std::env::remove_var("INGESTCTL_DIR");
		let cli = CliOverrides {
			whitelist: Some(PathBuf::from("/tmp/whitelist.txt")),
			source: Some("https://src.example".to_string()),
			dest: Some("https://dest.example".to_string()),
			parallelism: Some(0),
			..Default::default()
		};
		assert!(matches!(Config::resolve(cli), Err(ValidationError::InvalidConfig { .. })));
	}
}

// vim: ts=4
