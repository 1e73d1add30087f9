//! Transport trait for the wireless link to the recording device
//!
//! The radio driver is an external collaborator. Everything above this
//! trait speaks frames; everything below it (adapter, pairing, link-layer
//! retransmission) belongs to the driver. Two logical sub-channels sit
//! behind it: `write` targets the command characteristic and `recv`
//! drains the notification characteristic(s).

use async_trait::async_trait;
use bytes::Bytes;

use super::error::LinkError;
use super::types::ConnectionState;

/// Result type for link operations
pub type LinkResult<T> = Result<T, LinkError>;

/// Notifications delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
	/// Raw bytes from a notify characteristic; may hold partial or several frames
	Notification(Bytes),
	/// Connectivity change reported by the driver
	StateChanged(ConnectionState),
	/// Link lost
	Disconnected,
}

/// Core trait for a device transport
#[async_trait]
pub trait DeviceLink: Send {
	/// Transport name for diagnostics
	fn name(&self) -> &str;

	/// Find and connect to the paired device
	async fn connect(&mut self) -> LinkResult<()>;

	/// Drop the connection; a no-op when already disconnected
	async fn disconnect(&mut self) -> LinkResult<()>;

	/// Write one encoded frame to the command characteristic
	async fn write(&mut self, frame: &[u8]) -> LinkResult<()>;

	/// Wait for the next inbound notification or connectivity change
	async fn recv(&mut self) -> LinkResult<LinkEvent>;
}

#[async_trait]
impl<L: DeviceLink + ?Sized> DeviceLink for Box<L> {
	fn name(&self) -> &str {
		(**self).name()
	}

	async fn connect(&mut self) -> LinkResult<()> {
		(**self).connect().await
	}

	async fn disconnect(&mut self) -> LinkResult<()> {
		(**self).disconnect().await
	}

	async fn write(&mut self, frame: &[u8]) -> LinkResult<()> {
		(**self).write(frame).await
	}

	async fn recv(&mut self) -> LinkResult<LinkEvent> {
		(**self).recv().await
	}
}

// vim: ts=4
