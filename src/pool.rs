//! Bounded worker pool: caps in-flight remote operations at a fixed capacity
//! and provides a reusable completion barrier (SPEC_FULL.md §4.1).

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

/// A semaphore-guarded task pool. Cloning shares the same capacity and the
/// same in-flight task set — clone it to hand a submission handle to a
/// spawned task without moving the whole pool.
#[derive(Clone)]
pub struct Pool {
	semaphore: Arc<Semaphore>,
	tasks: Arc<Mutex<JoinSet<()>>>,
}

impl Pool {
	/// Construct a pool with `capacity` concurrent slots.
	pub fn new(capacity: usize) -> Self {
		Pool {
			semaphore: Arc::new(Semaphore::new(capacity.max(1))),
			tasks: Arc::new(Mutex::new(JoinSet::new())),
		}
	}

	/// Acquire one slot, blocking until capacity is available.
	pub async fn start(&self) -> OwnedSemaphorePermit {
		self.semaphore.clone().acquire_owned().await.expect("pool semaphore closed")
	}

	/// Acquire a slot, spawn `task` on a new concurrent unit of execution, and
	/// release the slot when it completes. Fire-and-forget: callers observe
	/// completion only through [`Pool::wait`].
	///
	/// The caller must not call `spawn` again on this same pool from inside
	/// `task` unless the pool still has spare capacity — doing so at full
	/// capacity deadlocks the pool against itself.
	pub async fn spawn<F>(&self, task: F)
	where
		F: Future<Output = ()> + Send + 'static,
	{
		let permit = self.start().await;
		let mut tasks = self.tasks.lock().await;
		tasks.spawn(async move {
			task.await;
			drop(permit);
		});
	}

	/// Block until every task submitted via `spawn` so far has completed.
	/// Reusable: the pool may be used again once this returns.
	pub async fn wait(&self) {
		let mut tasks = self.tasks.lock().await;
		while tasks.join_next().await.is_some() {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	#[tokio::test]
	async fn runs_tasks_up_to_capacity() {
		let pool = Pool::new(2);
		let inflight = Arc::new(AtomicUsize::new(0));
		let max_seen = Arc::new(AtomicUsize::new(0));

		for _ in 0..6 {
			let inflight = inflight.clone();
			let max_seen = max_seen.clone();
			pool.spawn(async move {
				let now = inflight.fetch_add(1, Ordering::SeqCst) + 1;
				max_seen.fetch_max(now, Ordering::SeqCst);
				tokio::time::sleep(Duration::from_millis(10)).await;
				inflight.fetch_sub(1, Ordering::SeqCst);
			})
			.await;
		}
		pool.wait().await;

		assert!(max_seen.load(Ordering::SeqCst) <= 2);
	}

	#[tokio::test]
	async fn wait_is_reusable() {
		let pool = Pool::new(4);
		let counter = Arc::new(AtomicUsize::new(0));

		for _ in 0..3 {
			let counter = counter.clone();
			pool.spawn(async move {
				counter.fetch_add(1, Ordering::SeqCst);
			})
			.await;
		}
		pool.wait().await;
		assert_eq!(counter.load(Ordering::SeqCst), 3);

		for _ in 0..2 {
			let counter = counter.clone();
			pool.spawn(async move {
				counter.fetch_add(1, Ordering::SeqCst);
			})
			.await;
		}
		pool.wait().await;
		assert_eq!(counter.load(Ordering::SeqCst), 5);
	}
}

// vim: ts=4
