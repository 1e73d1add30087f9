//! Public entry points for running a sync session

use crate::callbacks::{NoCallbacks, SyncCallbacks};
use crate::config::Config;
use crate::error::SyncError;
use crate::protocol::{DeviceLink, FileId};
use crate::sync_impl::SyncOrchestrator;
use crate::types::BatchSummary;

/// Builder for configuring and running a sync
pub struct SyncBuilder {
	config: Config,
	callbacks: Option<Box<dyn SyncCallbacks>>,
	selection: Option<Vec<FileId>>,
}

impl SyncBuilder {
	pub fn new() -> Self {
		Self { config: Config::default(), callbacks: None, selection: None }
	}

	pub fn config(mut self, config: Config) -> Self {
		self.config = config;
		self
	}

	pub fn callbacks(mut self, callbacks: Box<dyn SyncCallbacks>) -> Self {
		self.callbacks = Some(callbacks);
		self
	}

	/// Download only these files; everything on the device otherwise
	pub fn select(mut self, ids: Vec<FileId>) -> Self {
		self.selection = Some(ids);
		self
	}

	/// Validate the configuration and wire up an orchestrator
	pub fn build<L: DeviceLink>(self, link: L) -> Result<SyncOrchestrator<L>, SyncError> {
		self.config.validate()?;
		let callbacks = self.callbacks.unwrap_or_else(|| Box::new(NoCallbacks));
		Ok(SyncOrchestrator::new(link, self.config, callbacks))
	}

	/// Connect, list, download the selection and close
	pub async fn run<L: DeviceLink>(mut self, link: L) -> Result<BatchSummary, SyncError> {
		let selection = self.selection.take();
		let mut orchestrator = self.build(link)?;
		orchestrator.open().await?;

		let selected = match selection {
			Some(ids) => orchestrator.select(ids),
			None => orchestrator.select_all(),
		};
		if let Err(e) = selected {
			orchestrator.close().await;
			return Err(e);
		}
		orchestrator.sync_selected().await
	}
}

impl Default for SyncBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Download every recording on the device with default settings
pub async fn sync_all<L: DeviceLink>(link: L) -> Result<BatchSummary, SyncError> {
	SyncBuilder::new().run(link).await
}

// vim: ts=4
