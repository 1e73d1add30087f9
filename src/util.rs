//! Small shared helpers: cancellation and clock access

use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

/// Owner side of a cancellation signal
#[derive(Debug)]
pub struct CancelSource {
	tx: watch::Sender<bool>,
}

impl CancelSource {
	pub fn new() -> Self {
		let (tx, _rx) = watch::channel(false);
		Self { tx }
	}

	pub fn token(&self) -> CancelToken {
		CancelToken { rx: self.tx.subscribe() }
	}

	pub fn cancel(&self) {
		self.tx.send_replace(true);
	}

	/// Re-arm after a cancelled session; outstanding tokens see the reset
	pub fn reset(&self) {
		self.tx.send_replace(false);
	}

	pub fn is_cancelled(&self) -> bool {
		*self.tx.borrow()
	}
}

impl Default for CancelSource {
	fn default() -> Self {
		Self::new()
	}
}

/// Observer side of a cancellation signal
#[derive(Debug, Clone)]
pub struct CancelToken {
	rx: watch::Receiver<bool>,
}

impl CancelToken {
	/// Token that can never fire
	pub fn never() -> Self {
		let (_tx, rx) = watch::channel(false);
		Self { rx }
	}

	pub fn is_cancelled(&self) -> bool {
		*self.rx.borrow()
	}

	/// Resolves once cancellation is requested
	pub async fn cancelled(&self) {
		let mut rx = self.rx.clone();
		loop {
			if *rx.borrow_and_update() {
				return;
			}
			if rx.changed().await.is_err() {
				// Source dropped without cancelling
				std::future::pending::<()>().await;
			}
		}
	}
}

/// Host clock as unix seconds, saturating into the device's u32 field
pub fn unix_now() -> u32 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs().min(u32::MAX as u64) as u32)
		.unwrap_or(0)
}


// vim: ts=4
