//! Seekable reopener: wraps an `open() -> stream` factory and exposes it as a
//! reader that can be rewound to the start (SPEC_FULL.md §4.3).
//!
//! Used to hand the destination upload a rewindable reader over a one-shot
//! source stream without buffering the whole archive in memory or on disk —
//! a failed upload attempt just calls `open` again.

use std::io::SeekFrom;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

type OpenFuture = futures::future::BoxFuture<'static, std::io::Result<Box<dyn AsyncRead + Send + Unpin>>>;
type OpenFn = Box<dyn Fn() -> OpenFuture + Send + Sync>;

/// Adapts a repeatable stream factory into a single `AsyncRead + AsyncSeek`.
/// Any seek other than "to the start" fails; the factory is (re-)invoked
/// lazily on first read and on every seek-to-start.
pub struct Reopener {
	open: OpenFn,
	stream: Option<Box<dyn AsyncRead + Send + Unpin>>,
	pending_open: Option<OpenFuture>,
}

impl Reopener {
	pub fn new<F, Fut>(open: F) -> Self
	where
		F: Fn() -> Fut + Send + Sync + 'static,
		Fut: std::future::Future<Output = std::io::Result<Box<dyn AsyncRead + Send + Unpin>>> + Send + 'static,
	{
		Reopener { open: Box::new(move || Box::pin(open())), stream: None, pending_open: None }
	}
}

impl AsyncRead for Reopener {
	fn poll_read(
		mut self: Pin<&mut Self>,
		cx: &mut Context<'_>,
		buf: &mut ReadBuf<'_>,
	) -> Poll<std::io::Result<()>> {
		loop {
			if let Some(pending) = self.pending_open.as_mut() {
				match pending.as_mut().poll(cx) {
					Poll::Ready(Ok(stream)) => {
						self.pending_open = None;
						self.stream = Some(stream);
					}
					Poll::Ready(Err(e)) => {
						self.pending_open = None;
						return Poll::Ready(Err(e));
					}
					Poll::Pending => return Poll::Pending,
				}
				continue;
			}
			if self.stream.is_none() {
				self.pending_open = Some((self.open)());
				continue;
			}
			let stream = self.stream.as_mut().unwrap();
			return Pin::new(stream).poll_read(cx, buf);
		}
	}
}

impl AsyncSeek for Reopener {
	fn start_seek(mut self: Pin<&mut Self>, position: SeekFrom) -> std::io::Result<()> {
		match position {
			SeekFrom::Start(0) => {
				self.stream = None;
				self.pending_open = None;
				Ok(())
			}
			_ => Err(std::io::Error::new(
				std::io::ErrorKind::Unsupported,
				"Reopener only supports seeking to the start",
			)),
		}
	}

	fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<u64>> {
		Poll::Ready(Ok(0))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Arc;
	use tokio::io::{AsyncReadExt, AsyncSeekExt};

	#[tokio::test]
	async fn reads_through_the_factory_on_first_poll() {
		let reopener = Reopener::new(|| async { Ok(Box::new(std::io::Cursor::new(b"hello".to_vec())) as Box<dyn AsyncRead + Send + Unpin>) });
		let mut reopener = reopener;
		let mut buf = Vec::new();
		reopener.read_to_end(&mut buf).await.unwrap();
		assert_eq!(buf, b"hello");
	}

	#[tokio::test]
	async fn seek_to_start_reinvokes_the_factory() {
		let calls = Arc::new(AtomicUsize::new(0));
		let calls_clone = calls.clone();
		let reopener = Reopener::new(move || {
			calls_clone.fetch_add(1, Ordering::SeqCst);
			async { Ok(Box::new(std::io::Cursor::new(b"retry-me".to_vec())) as Box<dyn AsyncRead + Send + Unpin>) }
		});
		let mut reopener = reopener;

		let mut first = Vec::new();
		reopener.read_to_end(&mut first).await.unwrap();
		reopener.seek(SeekFrom::Start(0)).await.unwrap();
		let mut second = Vec::new();
		reopener.read_to_end(&mut second).await.unwrap();

		assert_eq!(first, second);
		assert_eq!(calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn nonzero_seek_is_rejected() {
		let reopener = Reopener::new(|| async { Ok(Box::new(std::io::Cursor::new(Vec::new())) as Box<dyn AsyncRead + Send + Unpin>) });
		let mut reopener = reopener;
		assert!(reopener.seek(SeekFrom::Start(5)).await.is_err());
	}
}

// vim: ts=4
