use clap::Parser;
use ingestctl::config::{CliOverrides, Config};
use ingestctl::registry::http::HttpRegistryClient;
use ingestctl::IngestError;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Replicate a whitelisted subset of charms and bundles between two artifact registries.
#[derive(Debug, Parser)]
#[command(name = "ingestctl", version, author = "Szilard Hajba <szilu@symbion.hu>")]
struct Cli {
	#[command(subcommand)]
	command: SubCommand,
}

#[derive(Debug, clap::Subcommand)]
enum SubCommand {
	/// Resolve the whitelist against the source and replicate it into the destination.
	Ingest(IngestArgs),
}

#[derive(Debug, clap::Args)]
struct IngestArgs {
	/// Path to the whitelist text file.
	#[arg(long)]
	whitelist: Option<PathBuf>,

	/// Source registry base URL.
	#[arg(long)]
	source: Option<String>,

	/// Destination registry base URL.
	#[arg(long)]
	dest: Option<String>,

	/// Worker-pool capacity: in-flight registry requests.
	#[arg(long)]
	parallelism: Option<usize>,

	/// Disk budget in bytes for scratch files. Unset means unlimited.
	#[arg(long)]
	max_disk: Option<u64>,

	/// Reject a resource larger than --max-disk instead of letting it run alone.
	#[arg(long)]
	disk_hard_limit: bool,

	/// Resolve and report what would be copied, but make no mutating calls.
	#[arg(long)]
	dry_run: bool,
}

impl From<IngestArgs> for CliOverrides {
	fn from(args: IngestArgs) -> Self {
		CliOverrides {
			whitelist: args.whitelist,
			source: args.source,
			dest: args.dest,
			parallelism: args.parallelism,
			max_disk: args.max_disk,
			disk_hard_limit: args.disk_hard_limit,
			dry_run: args.dry_run,
		}
	}
}

#[tokio::main]
async fn main() -> ExitCode {
	ingestctl::logging::init_tracing();

	let cli = Cli::parse();
	let SubCommand::Ingest(args) = cli.command;

	match run(args).await {
		Ok(code) => code,
		Err(e) => {
			eprintln!("ingestctl: {}", e);
			ExitCode::FAILURE
		}
	}
}

async fn run(args: IngestArgs) -> Result<ExitCode, IngestError> {
	let config = Config::resolve(args.into())?;

	let src = Arc::new(HttpRegistryClient::new(config.source.as_str()));
	let dest = Arc::new(HttpRegistryClient::new(config.dest.as_str()));

	let stats = ingestctl::run_ingest(&config, src, dest).await?;

	for message in &stats.errors {
		eprintln!("ingestctl: {}", message);
	}
	println!(
		"base entities: {}  entities: {}  failed: {}  archives copied: {}  resources transferred: {}",
		stats.base_entity_count,
		stats.entity_count,
		stats.failed_entity_count,
		stats.archives_copied_count,
		stats.resource_transfer_count,
	);

	Ok(ExitCode::SUCCESS)
}

// vim: ts=4
