//! Pull-based transfer event stream
//!
//! A [`Download`] borrows the client for the duration of one file and
//! yields [`TransferEvent`]s until a terminal one. Cancellation is
//! observed between responses; a cancelled download sends StopImport.

use tracing::{debug, info, warn};

use super::session::{TransferEvent, TransferSession};
use crate::error::TransferFailure;
use crate::protocol::{Command, DeviceClient, DeviceLink, FileCommand, RemoteFile, Request};
use crate::util::CancelToken;

pub struct Download<'a, L: DeviceLink> {
	client: &'a mut DeviceClient<L>,
	session: TransferSession,
	cancel: CancelToken,
	requested: bool,
	finished: bool,
}

impl<'a, L: DeviceLink> Download<'a, L> {
	pub fn new(client: &'a mut DeviceClient<L>, file: RemoteFile, cancel: CancelToken) -> Self {
		Self { client, session: TransferSession::new(file), cancel, requested: false, finished: false }
	}

	pub fn session(&self) -> &TransferSession {
		&self.session
	}

	/// Next event; `None` after the terminal event has been returned
	pub async fn next(&mut self) -> Option<TransferEvent> {
		if self.finished {
			return None;
		}
		let event = self.step().await;
		if event.is_terminal() {
			self.finished = true;
			match &event {
				TransferEvent::Completed(done) => {
					info!("Transfer of {} complete: {} bytes", done.file.display_name, done.byte_len())
				}
				TransferEvent::Failed(reason) => {
					warn!("Transfer of {} failed: {}", self.session.target().display_name, reason)
				}
				_ => info!("Transfer of {} cancelled", self.session.target().display_name),
			}
		}
		Some(event)
	}

	/// Drain to the terminal event, discarding intermediate progress
	pub async fn finish(mut self) -> TransferEvent {
		let mut last = TransferEvent::Cancelled;
		while let Some(event) = self.next().await {
			last = event;
		}
		last
	}

	async fn step(&mut self) -> TransferEvent {
		if self.cancel.is_cancelled() {
			return self.stop().await;
		}
		if !self.requested {
			self.requested = true;
			let request = self.session.request();
			let target = self.session.target();
			debug!("requesting {} ({})", target.display_name, hex::encode(&target.raw_name));
			if let Err(e) = self.client.send(&request).await {
				return self.session.fail(TransferFailure::from(e));
			}
		}

		loop {
			let next = tokio::select! {
				biased;
				_ = self.cancel.cancelled() => None,
				response = self.client.next_response() => Some(response),
			};
			let Some(response) = next else {
				return self.stop().await;
			};
			match response {
				Ok(response) => match self.session.apply(&response) {
					Some(event) => return event,
					None => self
						.client
						.divert(&response, Command::FileTransfer(FileCommand::FileData)),
				},
				Err(e) => return self.session.fail(TransferFailure::from(e)),
			}
		}
	}

	async fn stop(&mut self) -> TransferEvent {
		if self.requested {
			if let Err(e) = self.client.send(&Request::StopImport).await {
				debug!("StopImport not delivered: {}", e);
			}
		}
		self.session.cancel()
	}
}

// vim: ts=4
