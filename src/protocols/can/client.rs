//! SocketCAN frame source.
//!
//! Opens a SocketCAN interface, polls it from a tokio task and hands every
//! frame with the subscribed identifier to the driver, in arrival order.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use socketcan::{CanFrame, CanSocket, EmbeddedFrame, Frame as _, Socket};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::core::error::{PrintfError, Result};
use crate::core::frame::{Frame, MAX_DATA_LEN};
use crate::core::traits::{FrameHandler, FrameSource};

/// Pause after a read error other than `WouldBlock`.
const READ_ERROR_BACKOFF_MS: u64 = 100;

/// [`FrameSource`] reading from a SocketCAN interface.
pub struct SocketCanSource {
    can_interface: String,
    rx_poll_interval_ms: u64,

    is_running: Arc<AtomicBool>,

    // Statistics
    frame_count: Arc<AtomicU64>,
    error_count: Arc<AtomicU64>,
    last_error: Arc<Mutex<Option<String>>>,

    receive_handle: Option<JoinHandle<()>>,
}

impl SocketCanSource {
    /// Create a source for `can_interface` (e.g. "can0", "vcan0").
    pub fn new(can_interface: impl Into<String>, rx_poll_interval_ms: u64) -> Self {
        Self {
            can_interface: can_interface.into(),
            rx_poll_interval_ms: rx_poll_interval_ms.max(1),
            is_running: Arc::new(AtomicBool::new(false)),
            frame_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            last_error: Arc::new(Mutex::new(None)),
            receive_handle: None,
        }
    }

    /// Interface name.
    pub fn interface(&self) -> &str {
        &self.can_interface
    }

    /// Frames delivered to the handler.
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    /// Read errors seen since subscribing.
    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Most recent read error.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn open(&self) -> Result<CanSocket> {
        let socket = CanSocket::open(&self.can_interface).map_err(|e| {
            PrintfError::Connection(format!(
                "Failed to open CAN interface {}: {}",
                self.can_interface, e
            ))
        })?;
        socket.set_nonblocking(true).map_err(|e| {
            PrintfError::Connection(format!("Failed to set non-blocking mode: {}", e))
        })?;
        Ok(socket)
    }
}

/// Whether `frame` carries the subscribed 11-bit identifier.
///
/// `raw_id()` drops the extended flag, so an extended frame with the same
/// numeric id must be rejected explicitly.
fn matches_id(frame: &CanFrame, can_id: u32) -> bool {
    !frame.is_extended() && frame.raw_id() == can_id
}

/// Convert a SocketCAN frame. Error frames carry no printf data.
fn convert(frame: &CanFrame) -> Option<Result<Frame>> {
    let remote = match frame {
        CanFrame::Data(_) => false,
        CanFrame::Remote(_) => true,
        CanFrame::Error(_) => return None,
    };

    let payload = frame.data();
    let mut data = [0u8; MAX_DATA_LEN];
    let len = payload.len().min(MAX_DATA_LEN);
    data[..len].copy_from_slice(&payload[..len]);

    let dlc = if remote { frame.dlc() } else { payload.len() };
    Some(Frame::from_parts(frame.raw_id(), remote, dlc, data))
}

impl FrameSource for SocketCanSource {
    fn subscribe(&mut self, can_id: u32, handler: FrameHandler) -> Result<()> {
        if self.receive_handle.is_some() {
            return Err(PrintfError::AlreadyStarted);
        }

        let runtime = Handle::try_current()
            .map_err(|e| PrintfError::Connection(format!("no tokio runtime: {}", e)))?;
        let socket = self.open()?;

        #[cfg(feature = "tracing-support")]
        tracing::info!("CAN socket opened successfully on {}", self.can_interface);

        let can_interface = self.can_interface.clone();
        let is_running = Arc::clone(&self.is_running);
        let frame_count = Arc::clone(&self.frame_count);
        let error_count = Arc::clone(&self.error_count);
        let last_error = Arc::clone(&self.last_error);
        let rx_poll_interval = self.rx_poll_interval_ms;

        is_running.store(true, Ordering::SeqCst);

        let handle = runtime.spawn(async move {
            #[cfg(feature = "tracing-support")]
            tracing::info!(
                "CAN receive task started on {} (rx_poll_interval={}ms)",
                can_interface,
                rx_poll_interval
            );

            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_millis(rx_poll_interval));

            'poll: loop {
                interval.tick().await;

                // Drain everything queued since the last tick
                loop {
                    if !is_running.load(Ordering::SeqCst) {
                        #[cfg(feature = "tracing-support")]
                        tracing::info!("CAN receive loop stopping (unsubscribed)");
                        break 'poll;
                    }

                    match socket.read_frame() {
                        Ok(raw) => {
                            if !matches_id(&raw, can_id) {
                                continue;
                            }
                            match convert(&raw) {
                                Some(Ok(frame)) => {
                                    frame_count.fetch_add(1, Ordering::Relaxed);
                                    handler(frame);
                                }
                                Some(Err(e)) => {
                                    #[cfg(feature = "tracing-support")]
                                    tracing::warn!("Dropping CAN frame ID=0x{:03X}: {}", can_id, e);

                                    *last_error.lock().unwrap_or_else(PoisonError::into_inner) =
                                        Some(e.to_string());
                                    error_count.fetch_add(1, Ordering::Relaxed);
                                }
                                None => {
                                    #[cfg(feature = "tracing-support")]
                                    tracing::debug!("Skipping CAN error frame");
                                }
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                            // No data available until the next tick
                            break;
                        }
                        Err(e) => {
                            #[cfg(feature = "tracing-support")]
                            tracing::error!("CAN read error on {}: {:?}", can_interface, e);

                            *last_error.lock().unwrap_or_else(PoisonError::into_inner) =
                                Some(format!("CAN read error: {}", e));
                            error_count.fetch_add(1, Ordering::Relaxed);
                            tokio::time::sleep(tokio::time::Duration::from_millis(
                                READ_ERROR_BACKOFF_MS,
                            ))
                            .await;
                            break;
                        }
                    }
                }
            }

            #[cfg(feature = "tracing-support")]
            tracing::info!("CAN receive task stopped");
        });

        self.receive_handle = Some(handle);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.receive_handle.take() {
            handle.abort();

            #[cfg(feature = "tracing-support")]
            tracing::info!(
                "CAN source on {} unsubscribed: {} frames, {} read errors (last: {})",
                self.can_interface,
                self.frame_count(),
                self.error_count(),
                self.last_error().as_deref().unwrap_or("none")
            );
        }
    }

    fn name(&self) -> &str {
        &self.can_interface
    }
}

impl Drop for SocketCanSource {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
