//! File transfer state machine
//!
//! ```text
//! Idle -> Listing -> Ready -> Requested -> Importing -> { Completed | Failed | Cancelled }
//! ```
//!
//! [`listing::FileLister`] covers Idle through Ready, [`session::TransferSession`]
//! covers one file from Requested to its terminal outcome. Both are pure
//! state machines fed with typed responses; [`listing::list_files`] and
//! [`download::Download`] are the async drivers that pull responses off a
//! [`DeviceClient`](crate::protocol::DeviceClient).

pub mod download;
pub mod listing;
pub mod session;

pub use download::Download;
pub use listing::{list_files, FileLister, ListStep};
pub use session::{CompletedTransfer, TransferEvent, TransferProgress, TransferSession};

/// Position in the transfer state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
	Idle,
	Listing,
	Ready,
	Requested,
	Importing,
	Completed,
	Failed,
	Cancelled,
}

impl TransferState {
	pub fn is_terminal(&self) -> bool {
		matches!(self, TransferState::Completed | TransferState::Failed | TransferState::Cancelled)
	}
}

// vim: ts=4
