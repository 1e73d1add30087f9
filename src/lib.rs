//! # recsync - Recording Device Sync Engine
//!
//! recsync pairs with a wireless voice recorder, lists the recordings it
//! holds and downloads a selection of them over a single checksummed
//! command channel, handing each one back as a WAVE file.
//!
//! The radio driver is supplied by the caller through the
//! [`protocol::DeviceLink`] trait; [`emulator::LoopbackDevice`] is an
//! in-process implementation for tests and demos.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use recsync::emulator::LoopbackDevice;
//! use recsync::sync::sync_all;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let device = LoopbackDevice::from_config(&Default::default());
//!     let summary = sync_all(device).await?;
//!     println!("Downloaded {} files", summary.completed());
//!     Ok(())
//! }
//! ```
//!
//! ## Using the Builder Pattern
//!
//! ```rust,ignore
//! use recsync::callbacks::CallbackBuilder;
//! use recsync::sync::SyncBuilder;
//!
//! let callbacks = CallbackBuilder::new()
//!     .on_file_ready(|file, _| std::fs::write(&file.name, &file.bytes).unwrap())
//!     .build();
//! let summary = SyncBuilder::new().callbacks(callbacks).run(link).await?;
//! ```

pub mod audio;
pub mod callbacks;
pub mod config;
pub mod emulator;
pub mod error;
pub mod logging;
pub mod progress;
pub mod protocol;
pub mod sync;
pub mod sync_impl;
pub mod transfer;
pub mod types;
pub mod util;

// Re-export commonly used types and functions
pub use config::Config;
pub use error::{SyncError, TransferFailure};
pub use sync::{sync_all, SyncBuilder};
pub use sync_impl::{SessionSnapshot, SyncOrchestrator};
pub use types::{AssembledFile, BatchSummary, FileOutcome, FileResult};

// vim: ts=4
