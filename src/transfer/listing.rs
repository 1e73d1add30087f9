//! Listing phase: GetFileList, RetFileList pages, ListTransferComplete

use tracing::{debug, info};

use super::TransferState;
use crate::protocol::types::sort_newest_first;
use crate::protocol::{
	Command, DeviceClient, DeviceLink, FileCommand, ProtocolResult, RemoteFile, Request, Response,
};

/// Outcome of feeding one response to the lister
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStep {
	/// A page with this many entries was accumulated
	Page(usize),
	/// Listing finished; the catalog is ready
	Complete,
	/// Response does not belong to the listing exchange
	Ignored,
}

/// Accumulates catalog pages until the device signals the end of the list
#[derive(Debug)]
pub struct FileLister {
	state: TransferState,
	entries: Vec<RemoteFile>,
	pages: usize,
}

impl FileLister {
	pub fn new() -> Self {
		Self { state: TransferState::Idle, entries: Vec::new(), pages: 0 }
	}

	pub fn state(&self) -> TransferState {
		self.state
	}

	/// Enter Listing; returns the request to send
	pub fn begin(&mut self) -> Request {
		self.state = TransferState::Listing;
		self.entries.clear();
		self.pages = 0;
		Request::GetFileList
	}

	pub fn apply(&mut self, response: &Response) -> ListStep {
		if self.state != TransferState::Listing {
			return ListStep::Ignored;
		}
		match response {
			Response::FileListPage(files) => {
				self.pages += 1;
				self.entries.extend(files.iter().cloned());
				ListStep::Page(files.len())
			}
			Response::ListComplete => {
				self.state = TransferState::Ready;
				ListStep::Complete
			}
			_ => ListStep::Ignored,
		}
	}

	/// Catalog sorted newest first; empty unless the lister reached Ready
	pub fn into_catalog(self) -> Vec<RemoteFile> {
		if self.state != TransferState::Ready {
			return Vec::new();
		}
		let mut entries = self.entries;
		sort_newest_first(&mut entries);
		entries
	}
}

impl Default for FileLister {
	fn default() -> Self {
		Self::new()
	}
}

/// Drive a full listing exchange and return the catalog
pub async fn list_files<L: DeviceLink>(client: &mut DeviceClient<L>) -> ProtocolResult<Vec<RemoteFile>> {
	let mut lister = FileLister::new();
	client.send(&lister.begin()).await?;

	loop {
		let response = client.next_response().await?;
		match lister.apply(&response) {
			ListStep::Page(n) => debug!("file list page: {} entries", n),
			ListStep::Complete => break,
			ListStep::Ignored => {
				client.divert(&response, Command::FileTransfer(FileCommand::RetFileList))
			}
		}
	}

	let pages = lister.pages;
	let catalog = lister.into_catalog();
	info!("Device lists {} files in {} pages", catalog.len(), pages);
	Ok(catalog)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn file(name: &str, created_at: u32) -> RemoteFile {
		RemoteFile::new(name.as_bytes().to_vec(), 32000, 1, created_at)
	}

	#[test]
	fn test_pages_accumulate_until_complete() {
		let mut lister = FileLister::new();
		assert_eq!(lister.begin(), Request::GetFileList);
		assert_eq!(lister.state(), TransferState::Listing);

		let page = Response::FileListPage(vec![file("a", 1), file("b", 3)]);
		assert_eq!(lister.apply(&page), ListStep::Page(2));
		assert_eq!(lister.apply(&Response::FileListPage(vec![file("c", 2)])), ListStep::Page(1));
		assert_eq!(lister.apply(&Response::Battery(10)), ListStep::Ignored);
		assert_eq!(lister.apply(&Response::ListComplete), ListStep::Complete);
		assert_eq!(lister.state(), TransferState::Ready);

		let names: Vec<_> = lister.into_catalog().into_iter().map(|f| f.display_name).collect();
		assert_eq!(names, vec!["b", "c", "a"]);
	}

	#[test]
	fn test_empty_listing() {
		let mut lister = FileLister::new();
		lister.begin();
		assert_eq!(lister.apply(&Response::ListComplete), ListStep::Complete);
		assert!(lister.into_catalog().is_empty());
	}

	#[test]
	fn test_responses_before_begin_are_ignored() {
		let mut lister = FileLister::new();
		assert_eq!(lister.apply(&Response::FileListPage(vec![file("a", 1)])), ListStep::Ignored);
		assert_eq!(lister.apply(&Response::ListComplete), ListStep::Ignored);
		assert_eq!(lister.state(), TransferState::Idle);
	}

	#[test]
	fn test_incomplete_listing_yields_no_catalog() {
		let mut lister = FileLister::new();
		lister.begin();
		lister.apply(&Response::FileListPage(vec![file("a", 1)]));
		assert!(lister.into_catalog().is_empty());
	}
}

// vim: ts=4
