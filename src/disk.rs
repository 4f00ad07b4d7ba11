//! Weighted disk-budget semaphore guarding total scratch-file bytes in flight
//! (SPEC_FULL.md §4.2).

use crate::error::DiskError;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Disk-limiter accounting is done in units of this many bytes, so that byte
/// counts comfortably fit the `u32` weight `tokio::sync::Semaphore` expects.
const WEIGHT_UNIT_BYTES: u64 = 1024;

fn to_units(bytes: u64) -> u32 {
	(bytes.div_ceil(WEIGHT_UNIT_BYTES)) as u32
}

/// Whether an over-budget request is rejected outright or allowed to run
/// alone, consuming the entire budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskLimitMode {
	Hard,
	Soft,
}

/// Weighted semaphore over scratch-file bytes, plus the directory new scratch
/// files are created in.
#[derive(Clone)]
pub struct DiskLimiter {
	max_disk: u64,
	mode: DiskLimitMode,
	/// `None` when `max_disk == 0` (limiter disabled).
	semaphore: Option<Arc<Semaphore>>,
	scratch_dir: std::path::PathBuf,
}

impl DiskLimiter {
	pub fn new(max_disk: u64, mode: DiskLimitMode, scratch_dir: std::path::PathBuf) -> Self {
		let semaphore =
			if max_disk == 0 { None } else { Some(Arc::new(Semaphore::new(to_units(max_disk) as usize))) };
		DiskLimiter { max_disk, mode, semaphore, scratch_dir }
	}

	/// Acquire `size` bytes of scratch budget and a fresh scratch file.
	/// Blocks until the weight is available. See SPEC_FULL.md §4.2 for the
	/// hard/soft-limit policy on oversized requests.
	pub async fn get_disk(&self, size: u64) -> Result<ScratchFile, DiskError> {
		let permit = match &self.semaphore {
			None => None,
			Some(semaphore) => {
				let requested = if size > self.max_disk {
					match self.mode {
						DiskLimitMode::Hard => {
							return Err(DiskError::TooLarge { requested: size, max: self.max_disk });
						}
						// One oversized resource consumes the whole budget and runs alone.
						DiskLimitMode::Soft => self.max_disk,
					}
				} else {
					size
				};
				Some(
					semaphore
						.clone()
						.acquire_many_owned(to_units(requested))
						.await
						.expect("disk semaphore closed"),
				)
			}
		};

		std::fs::create_dir_all(&self.scratch_dir)?;
		let file = tempfile::NamedTempFile::new_in(&self.scratch_dir)?;
		Ok(ScratchFile { file: Some(file), _permit: permit })
	}
}

/// A scoped scratch file. Dropping it deletes the underlying file and returns
/// its weight to the limiter, in that order.
pub struct ScratchFile {
	file: Option<tempfile::NamedTempFile>,
	_permit: Option<OwnedSemaphorePermit>,
}

impl ScratchFile {
	pub fn path(&self) -> &std::path::Path {
		self.file.as_ref().expect("scratch file already taken").path()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	#[tokio::test]
	async fn disabled_limiter_never_blocks() {
		let dir = tempfile::tempdir().unwrap();
		let limiter = DiskLimiter::new(0, DiskLimitMode::Hard, dir.path().to_path_buf());
		let a = limiter.get_disk(10_000_000).await.unwrap();
		let b = limiter.get_disk(10_000_000).await.unwrap();
		assert!(a.path().exists());
		assert!(b.path().exists());
	}

	#[tokio::test]
	async fn hard_limit_rejects_oversized_request() {
		let dir = tempfile::tempdir().unwrap();
		let limiter = DiskLimiter::new(1024, DiskLimitMode::Hard, dir.path().to_path_buf());
		let err = limiter.get_disk(2048).await.unwrap_err();
		assert!(matches!(err, DiskError::TooLarge { .. }));
	}

	#[tokio::test]
	async fn soft_limit_lets_oversized_request_run_alone() {
		let dir = tempfile::tempdir().unwrap();
		let limiter = DiskLimiter::new(1024, DiskLimitMode::Soft, dir.path().to_path_buf());
		let scratch = limiter.get_disk(10_000).await.unwrap();
		assert!(scratch.path().exists());
	}

	#[tokio::test]
	async fn budget_blocks_until_released() {
		let dir = tempfile::tempdir().unwrap();
		let limiter = DiskLimiter::new(1024, DiskLimitMode::Soft, dir.path().to_path_buf());
		let first = limiter.get_disk(1024).await.unwrap();

		let limiter2 = limiter.clone();
		let second = tokio::spawn(async move { limiter2.get_disk(512).await.unwrap() });

		tokio::time::sleep(Duration::from_millis(20)).await;
		assert!(!second.is_finished());

		drop(first);
		let scratch = second.await.unwrap();
		assert!(scratch.path().exists());
	}
}

// vim: ts=4
