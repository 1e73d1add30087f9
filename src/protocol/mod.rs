//! Device wire protocol
//!
//! Layered bottom-up: checksum engine, packet codec, command model, and
//! the client that drives a [`DeviceLink`]. The sync engine depends only
//! on the client and the link trait, never on a concrete radio driver.
//!
//! # Example Usage
//!
//! ```ignore
//! use recsync::protocol::{DeviceClient, Request, Response};
//!
//! let mut client = DeviceClient::new(link);
//! client.connect().await?;
//! if let Response::Battery(pct) = client.request(Request::GetBattery).await? {
//!     println!("battery at {}%", pct);
//! }
//! ```

pub mod client;
pub mod codec;
pub mod crc;
pub mod error;
pub mod messages;
pub mod traits;
pub mod types;

// Re-export public API
pub use client::{ClientStats, DeviceClient, ProtocolResult};
pub use codec::{decode, encode, Frame, FrameBuffer, SequenceCounter, HEADER_LEN, MAGIC};
pub use error::{LinkError, ProtocolError};
pub use messages::{DeviceEvent, Request, Response, StatusUpdate};
pub use traits::{DeviceLink, LinkEvent, LinkResult};
pub use types::{
	AudioStreamCommand, ButtonCommand, Capacity, Command, ConnectionState, ControlCommand,
	DataType, DeviceStatus, FileCommand, FileId, FirmwareVersion, RemoteFile,
};

// vim: ts=4
