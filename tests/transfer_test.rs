/// Listing and download drivers against the loopback device
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;

use recsync::emulator::{LoopbackDevice, TransferFault, PAGE_SIZE};
use recsync::protocol::{ButtonCommand, DeviceClient, DeviceEvent, Request};
use recsync::transfer::{list_files, Download, TransferEvent};
use recsync::util::{CancelSource, CancelToken};
use recsync::TransferFailure;

fn device() -> LoopbackDevice {
	LoopbackDevice::new("test")
		.with_chunk_size(100)
		.with_mtu(32)
		.with_recording(b"OLD", Bytes::from(vec![1u8; 250]), 100)
		.with_recording(b"NEW", Bytes::from(vec![2u8; 1000]), 300)
		.with_recording(b"MID", Bytes::from(vec![3u8; 0]), 200)
}

async fn connected(device: LoopbackDevice) -> DeviceClient<LoopbackDevice> {
	let mut client = DeviceClient::new(device);
	client.connect().await.unwrap();
	client
}

#[tokio::test]
async fn test_listing_sorts_newest_first() {
	let mut client = connected(device()).await;
	let catalog = list_files(&mut client).await.unwrap();
	let names: Vec<_> = catalog.iter().map(|f| f.display_name.as_str()).collect();
	assert_eq!(names, vec!["NEW", "MID", "OLD"]);
	assert_eq!(catalog[0].size_bytes, 1000);
}

#[tokio::test]
async fn test_listing_spans_pages() {
	let mut device = LoopbackDevice::new("paged");
	for i in 0..(PAGE_SIZE * 2 + 1) {
		device = device.with_recording(format!("R{}", i).as_bytes(), Bytes::new(), i as u32);
	}
	let mut client = connected(device).await;
	let catalog = list_files(&mut client).await.unwrap();
	assert_eq!(catalog.len(), PAGE_SIZE * 2 + 1);
}

#[tokio::test]
async fn test_download_reports_progress_and_completes() {
	let mut client = connected(device()).await;
	let catalog = list_files(&mut client).await.unwrap();
	let target = catalog[0].clone();

	let mut download = Download::new(&mut client, target, CancelToken::never());
	let mut percents = Vec::new();
	let mut completed = None;
	while let Some(event) = download.next().await {
		match event {
			TransferEvent::Started { expected_size } => assert_eq!(expected_size, 1000),
			TransferEvent::Progress(p) => percents.push(p.percent),
			TransferEvent::Completed(done) => completed = Some(done),
			other => panic!("unexpected {:?}", other),
		}
	}
	assert_eq!(percents, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
	let done = completed.unwrap();
	assert_eq!(done.byte_len(), 1000);
	assert!(done.chunks.iter().all(|c| c.iter().all(|&b| b == 2)));
}

#[tokio::test]
async fn test_zero_length_file_completes() {
	let mut client = connected(device()).await;
	let catalog = list_files(&mut client).await.unwrap();
	let empty = catalog.into_iter().find(|f| f.size_bytes == 0).unwrap();
	let event = Download::new(&mut client, empty, CancelToken::never()).finish().await;
	assert!(matches!(event, TransferEvent::Completed(ref done) if done.byte_len() == 0));
}

#[tokio::test]
async fn test_short_transfer_fails_with_size_mismatch() {
	let mut client = connected(device().with_fault(b"NEW", TransferFault::ShortBy(10))).await;
	let catalog = list_files(&mut client).await.unwrap();
	let event = Download::new(&mut client, catalog[0].clone(), CancelToken::never()).finish().await;
	assert_eq!(
		event,
		TransferEvent::Failed(TransferFailure::SizeMismatch { expected: 1000, received: 990 })
	);
}

#[tokio::test]
async fn test_corrupt_chunk_is_dropped_and_fails_transfer() {
	let mut client = connected(device().with_fault(b"NEW", TransferFault::CorruptChunk(3))).await;
	let catalog = list_files(&mut client).await.unwrap();
	let event = Download::new(&mut client, catalog[0].clone(), CancelToken::never()).finish().await;
	assert_eq!(
		event,
		TransferEvent::Failed(TransferFailure::SizeMismatch { expected: 1000, received: 900 })
	);
	assert_eq!(client.stats().invalid_frames, 1);
}

#[tokio::test]
async fn test_device_stop_cancels() {
	let mut client = connected(device().with_fault(b"NEW", TransferFault::StopAfter(2))).await;
	let catalog = list_files(&mut client).await.unwrap();
	let event = Download::new(&mut client, catalog[0].clone(), CancelToken::never()).finish().await;
	assert_eq!(event, TransferEvent::Cancelled);
}

#[tokio::test]
async fn test_disconnect_fails_transfer() {
	let mut client = connected(device().with_fault(b"NEW", TransferFault::DisconnectAfter(4))).await;
	let catalog = list_files(&mut client).await.unwrap();
	let event = Download::new(&mut client, catalog[0].clone(), CancelToken::never()).finish().await;
	assert_eq!(event, TransferEvent::Failed(TransferFailure::Disconnected));
	assert!(!client.link().is_connected());
}

#[tokio::test]
async fn test_host_cancel_sends_stop_import() {
	let mut client = connected(device()).await;
	let catalog = list_files(&mut client).await.unwrap();
	let source = CancelSource::new();

	let mut download = Download::new(&mut client, catalog[0].clone(), source.token());
	let mut events = 0;
	while let Some(event) = download.next().await {
		events += 1;
		if events == 3 {
			source.cancel();
		}
		if event.is_terminal() {
			assert_eq!(event, TransferEvent::Cancelled);
		}
	}
	assert_eq!(download.session().received(), 0);
	drop(download);
	assert_eq!(client.link().requests().last(), Some(&Request::StopImport));

	// The device answers normally after the stop
	let catalog = list_files(&mut client).await.unwrap();
	assert_eq!(catalog.len(), 3);
}

#[tokio::test]
async fn test_button_press_routed_out_of_band() {
	let (tx, mut rx) = mpsc::unbounded_channel();
	let device = device().with_fault(b"NEW", TransferFault::ButtonAfter(5, ButtonCommand::DoublePress));
	let mut client = DeviceClient::new(device).with_events(tx);
	client.connect().await.unwrap();
	let catalog = list_files(&mut client).await.unwrap();

	let event = Download::new(&mut client, catalog[0].clone(), CancelToken::never()).finish().await;
	assert!(matches!(event, TransferEvent::Completed(ref done) if done.byte_len() == 1000));

	let mut buttons = Vec::new();
	while let Ok(event) = rx.try_recv() {
		if let DeviceEvent::Button(b) = event {
			buttons.push(b);
		}
	}
	assert_eq!(buttons, vec![ButtonCommand::DoublePress]);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_transfer_times_out_with_watchdog() {
	let device = device().with_fault(b"NEW", TransferFault::StallAfter(2));
	let mut client = DeviceClient::new(device).with_response_timeout(Some(Duration::from_secs(5)));
	client.connect().await.unwrap();
	let catalog = list_files(&mut client).await.unwrap();

	let event = Download::new(&mut client, catalog[0].clone(), CancelToken::never()).finish().await;
	assert_eq!(event, TransferEvent::Failed(TransferFailure::Timeout));
}

// vim: ts=4
