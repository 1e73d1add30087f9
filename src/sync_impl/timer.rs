//! Per-file elapsed-time counter
//!
//! A spawned interval task bumps a shared counter and mirrors it into the
//! session snapshot. The task never outlives the timer: it is aborted on
//! `stop`, on restart and on drop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::state::SessionSnapshot;

pub struct ElapsedTimer {
	elapsed_ms: Arc<AtomicU64>,
	task: Option<JoinHandle<()>>,
}

impl ElapsedTimer {
	pub fn new() -> Self {
		Self { elapsed_ms: Arc::new(AtomicU64::new(0)), task: None }
	}

	/// Zero the counter and start ticking every `period`
	pub fn start(&mut self, period: Duration, snapshot: Arc<watch::Sender<SessionSnapshot>>) {
		self.stop();
		self.elapsed_ms.store(0, Ordering::SeqCst);

		let elapsed_ms = self.elapsed_ms.clone();
		let step = period.as_millis().min(u64::MAX as u128) as u64;
		self.task = Some(tokio::spawn(async move {
			let mut interval = time::interval_at(Instant::now() + period, period);
			interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
			loop {
				interval.tick().await;
				let total = elapsed_ms.fetch_add(step, Ordering::SeqCst) + step;
				snapshot.send_modify(|s| s.elapsed_secs = total / 1000);
			}
		}));
	}

	/// Stop ticking; the counter keeps its last value
	pub fn stop(&mut self) {
		if let Some(task) = self.task.take() {
			task.abort();
		}
	}

	pub fn is_running(&self) -> bool {
		self.task.is_some()
	}

	pub fn elapsed(&self) -> Duration {
		Duration::from_millis(self.elapsed_ms.load(Ordering::SeqCst))
	}

	pub fn elapsed_secs(&self) -> u64 {
		self.elapsed().as_secs()
	}
}

impl Default for ElapsedTimer {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for ElapsedTimer {
	fn drop(&mut self) {
		self.stop();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn snapshot_channel() -> (Arc<watch::Sender<SessionSnapshot>>, watch::Receiver<SessionSnapshot>) {
		let (tx, rx) = watch::channel(SessionSnapshot::default());
		(Arc::new(tx), rx)
	}

	#[tokio::test(start_paused = true)]
	async fn test_ticks_once_per_period() {
		let (tx, rx) = snapshot_channel();
		let mut timer = ElapsedTimer::new();
		timer.start(Duration::from_secs(1), tx);

		time::sleep(Duration::from_millis(3500)).await;
		assert_eq!(timer.elapsed_secs(), 3);
		assert_eq!(rx.borrow().elapsed_secs, 3);
	}

	#[tokio::test(start_paused = true)]
	async fn test_stop_freezes_counter() {
		let (tx, _rx) = snapshot_channel();
		let mut timer = ElapsedTimer::new();
		timer.start(Duration::from_secs(1), tx);
		time::sleep(Duration::from_millis(2500)).await;
		timer.stop();
		assert!(!timer.is_running());

		time::sleep(Duration::from_secs(10)).await;
		assert_eq!(timer.elapsed_secs(), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn test_restart_resets() {
		let (tx, _rx) = snapshot_channel();
		let mut timer = ElapsedTimer::new();
		timer.start(Duration::from_secs(1), tx.clone());
		time::sleep(Duration::from_millis(4500)).await;
		timer.start(Duration::from_secs(1), tx);
		assert_eq!(timer.elapsed_secs(), 0);
		time::sleep(Duration::from_millis(1500)).await;
		assert_eq!(timer.elapsed_secs(), 1);
	}
}

// vim: ts=4
