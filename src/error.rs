//! Error types for ingestion operations

use std::error::Error;
use std::fmt;
use std::io;

/// Helper function to reduce Box::new() boilerplate when wrapping errors
#[inline]
pub fn boxed_error<E: Error + Send + Sync + 'static>(e: E) -> Box<dyn Error + Send + Sync> {
	Box::new(e)
}

/// Errors a registry client can raise (see the client contract in SPEC_FULL.md §6.1).
///
/// `NotFound` is meaningful control flow for the core (it distinguishes "copy" from
/// "reconcile existing"); everything else is opaque transport/unexpected failure.
#[derive(Debug)]
pub enum RegistryError {
	/// The entity, resource, or base entity does not exist on the given channel.
	NotFound,
	/// The destination already has a revision under this id with a different archive.
	Conflict { message: String },
	/// The uploaded resource map did not match what publish expected.
	ResourceMismatch { message: String },
	/// Any transport-level or unexpected failure.
	Transport(Box<dyn Error + Send + Sync>),
}

impl fmt::Display for RegistryError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RegistryError::NotFound => write!(f, "not found"),
			RegistryError::Conflict { message } => write!(f, "conflict: {}", message),
			RegistryError::ResourceMismatch { message } => {
				write!(f, "resource mismatch: {}", message)
			}
			RegistryError::Transport(e) => write!(f, "transport error: {}", e),
		}
	}
}

impl Error for RegistryError {}

impl RegistryError {
	pub fn is_not_found(&self) -> bool {
		matches!(self, RegistryError::NotFound)
	}

	pub fn transport<E: Error + Send + Sync + 'static>(e: E) -> Self {
		RegistryError::Transport(boxed_error(e))
	}
}

impl From<io::Error> for RegistryError {
	fn from(e: io::Error) -> Self {
		RegistryError::Transport(Box::new(e))
	}
}

/// Disk budget errors (see the disk limiter in SPEC_FULL.md §4.2).
#[derive(Debug)]
pub enum DiskError {
	/// Requested size exceeds the budget and hard-limit mode is active.
	TooLarge { requested: u64, max: u64 },
	Io(io::Error),
}

impl fmt::Display for DiskError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DiskError::TooLarge { requested, max } => {
				write!(f, "requested {} bytes exceeds disk budget of {} bytes", requested, max)
			}
			DiskError::Io(e) => write!(f, "scratch file I/O error: {}", e),
		}
	}
}

impl Error for DiskError {}

impl From<io::Error> for DiskError {
	fn from(e: io::Error) -> Self {
		DiskError::Io(e)
	}
}

/// Whitelist parsing / entity-id validation errors, fatal at CLI entry.
#[derive(Debug)]
pub enum ValidationError {
	InvalidEntityId { input: String, message: String },
	InvalidChannel { entity: String, channel: String },
	EmptyWhitelist,
	/// Malformed or missing configuration, caught before the core ever runs.
	InvalidConfig { message: String },
	Io(io::Error),
}

impl fmt::Display for ValidationError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ValidationError::InvalidEntityId { input, message } => {
				write!(f, "invalid entity id {:?}: {}", input, message)
			}
			ValidationError::InvalidChannel { entity, channel } => {
				write!(f, "invalid channel {:?} for entity {:?}", channel, entity)
			}
			ValidationError::EmptyWhitelist => write!(f, "whitelist contains no entries"),
			ValidationError::InvalidConfig { message } => write!(f, "invalid configuration: {}", message),
			ValidationError::Io(e) => write!(f, "failed to read whitelist: {}", e),
		}
	}
}

impl Error for ValidationError {}

impl From<io::Error> for ValidationError {
	fn from(e: io::Error) -> Self {
		ValidationError::Io(e)
	}
}

/// Unified error type surfaced by the ingestion core.
///
/// Most per-entity failures are *recorded* into `IngestStats.errors` rather than
/// propagated (see SPEC_FULL.md §7); this type exists for the minority of cases that
/// abort the whole run (CLI validation, config loading) and for the accumulated
/// per-entity messages themselves.
#[derive(Debug)]
pub enum IngestError {
	/// Fatal at CLI entry, before the core runs.
	Validation(ValidationError),
	/// Disk budget exceeded in hard-limit mode.
	Disk(DiskError),
	/// Registry client error (nested).
	Registry(RegistryError),
	/// Generic error message, used for accumulated per-entity failures.
	Other { message: String },
}

impl fmt::Display for IngestError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			IngestError::Validation(e) => write!(f, "{}", e),
			IngestError::Disk(e) => write!(f, "{}", e),
			IngestError::Registry(e) => write!(f, "{}", e),
			IngestError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for IngestError {}

impl From<ValidationError> for IngestError {
	fn from(e: ValidationError) -> Self {
		IngestError::Validation(e)
	}
}

impl From<DiskError> for IngestError {
	fn from(e: DiskError) -> Self {
		IngestError::Disk(e)
	}
}

impl From<RegistryError> for IngestError {
	fn from(e: RegistryError) -> Self {
		IngestError::Registry(e)
	}
}

impl From<String> for IngestError {
	fn from(message: String) -> Self {
		IngestError::Other { message }
	}
}

// vim: ts=4
