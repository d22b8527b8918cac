//! Frame listener driving the line assembler.
//!
//! The [`Driver`] subscribes to one CAN identifier, feeds every payload into
//! a [`LineAssembler`], prints completed lines with a timestamp and keeps at
//! most one idle-flush timer pending.
//!
//! Frame callbacks and timer callbacks may arrive on different threads. Both
//! go through one mutex that covers ingest, flush, rendering and timer
//! arm/cancel, so events are processed one at a time.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use canprintf::prelude::*;
//!
//! let config = PrintfConfig::default();
//! let mut driver = Driver::new(&config, Arc::new(TokioTimer::new()), Arc::new(StdoutSink));
//! driver.start(Box::new(SocketCanSource::new(&config.interface, config.rx_poll_interval_ms)))?;
//! tokio::signal::ctrl_c().await?;
//! driver.stop();
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use crate::assembler::{Emission, FlushRequest, LineAssembler};
use crate::config::PrintfConfig;
use crate::core::error::{PrintfError, Result};
use crate::core::frame::Frame;
use crate::core::traits::{FrameHandler, FrameSource, OutputSink, TimerFacility, TimerHandle};
use crate::timestamp;

/// Produces the timestamp prefix for each emitted line.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

/// Lifecycle of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Constructed, not subscribed.
    Idle,
    /// Subscribed to the frame source.
    Listening,
    /// Stopped. Terminal.
    Stopped,
}

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Frames with the printf identifier that were processed.
    pub frames_received: u64,
    /// Frames rejected for an invalid data length.
    pub frames_dropped: u64,
    /// Frames with another identifier.
    pub frames_ignored: u64,
    /// Lines written to the sink.
    pub lines_emitted: u64,
    /// Lines emitted by the idle flush.
    pub idle_flushes: u64,
    /// Idle-flush timers the facility refused to schedule.
    pub timer_failures: u64,
}

#[derive(Default)]
struct Counters {
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    frames_ignored: AtomicU64,
    lines_emitted: AtomicU64,
    idle_flushes: AtomicU64,
    timer_failures: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DriverStats {
        DriverStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_ignored: self.frames_ignored.load(Ordering::Relaxed),
            lines_emitted: self.lines_emitted.load(Ordering::Relaxed),
            idle_flushes: self.idle_flushes.load(Ordering::Relaxed),
            timer_failures: self.timer_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingFlush {
    handle: TimerHandle,
    generation: u64,
}

struct Session {
    assembler: LineAssembler,
    pending: Option<PendingFlush>,
    // Bumped on every arm so that an expiry racing a cancel is recognised.
    generation: u64,
    state: DriverState,
    last_error: Option<String>,
}

struct Inner {
    can_id: u32,
    flush_timeout: Duration,
    timer: Arc<dyn TimerFacility>,
    sink: Arc<dyn OutputSink>,
    clock: Clock,
    session: Mutex<Session>,
    counters: Counters,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle_frame(self: &Arc<Self>, frame: Frame) {
        let mut session = self.lock();
        if session.state == DriverState::Stopped {
            return;
        }

        if frame.can_id() != self.can_id {
            self.counters.frames_ignored.fetch_add(1, Ordering::Relaxed);

            #[cfg(feature = "tracing-support")]
            tracing::trace!("Ignoring CAN frame: ID=0x{:03X}", frame.can_id());
            return;
        }

        self.ingest(&mut session, frame.raw_data(), frame.len());
    }

    fn ingest(self: &Arc<Self>, session: &mut Session, data: &[u8; 8], len: usize) {
        let emission = match session.assembler.ingest(data, len) {
            Ok(emission) => emission,
            Err(e) => {
                self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                session.last_error = Some(e.to_string());

                #[cfg(feature = "tracing-support")]
                tracing::warn!("Dropping printf frame: {}", e);
                return;
            }
        };
        self.counters.frames_received.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "tracing-support")]
        tracing::trace!("Printf frame: Data={:02X?}", &data[..len]);

        self.emit(&emission);
        self.apply_flush(session, &emission);
    }

    fn on_timeout(&self, generation: u64) {
        let mut session = self.lock();
        if session.state == DriverState::Stopped {
            return;
        }

        match session.pending {
            Some(pending) if pending.generation == generation => session.pending = None,
            _ => {
                #[cfg(feature = "tracing-support")]
                tracing::trace!("Ignoring stale idle flush (generation {})", generation);
                return;
            }
        }

        let emission = session.assembler.force_flush();
        if !emission.is_empty() {
            self.counters.idle_flushes.fetch_add(1, Ordering::Relaxed);

            #[cfg(feature = "tracing-support")]
            tracing::debug!("Idle flush after {:?}", self.flush_timeout);
        }
        self.emit(&emission);
    }

    fn emit(&self, emission: &Emission) {
        if emission.is_empty() {
            return;
        }
        let ts = (self.clock)();
        for line in &emission.lines {
            self.sink.write(&timestamp::render_line(&ts, line));
            self.counters.lines_emitted.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Arm or cancel the idle flush after an ingest.
    ///
    /// The timeout runs from the moment the buffer became non-empty: more
    /// bytes for the same line keep the pending timer, but a line that was
    /// closed and reopened within one frame starts a fresh window.
    fn apply_flush(self: &Arc<Self>, session: &mut Session, emission: &Emission) {
        let drained = !emission.is_empty();
        if emission.flush == FlushRequest::Cancel || drained {
            if let Some(pending) = session.pending.take() {
                self.timer.cancel(pending.handle);
            }
        }
        if emission.flush == FlushRequest::Arm && session.pending.is_none() {
            self.arm(session);
        }
    }

    fn arm(self: &Arc<Self>, session: &mut Session) {
        session.generation += 1;
        let generation = session.generation;
        let weak: Weak<Inner> = Arc::downgrade(self);

        let scheduled = self.timer.schedule_once(
            self.flush_timeout,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.on_timeout(generation);
                }
            }),
        );

        match scheduled {
            Ok(handle) => {
                session.pending = Some(PendingFlush { handle, generation });
            }
            Err(e) => {
                // Recoverable: the next frame that leaves a partial line retries.
                self.counters.timer_failures.fetch_add(1, Ordering::Relaxed);
                session.last_error = Some(e.to_string());

                #[cfg(feature = "tracing-support")]
                tracing::warn!("Idle flush not armed: {}", e);
            }
        }
    }

    fn shutdown(&self) {
        let mut session = self.lock();
        if session.state == DriverState::Stopped {
            return;
        }
        session.state = DriverState::Stopped;
        if let Some(pending) = session.pending.take() {
            self.timer.cancel(pending.handle);
        }

        #[cfg(feature = "tracing-support")]
        {
            if !session.assembler.is_empty() {
                tracing::debug!(
                    "Discarding partial line on stop: {:?}",
                    session.assembler.pending()
                );
            }
        }
        session.assembler.reset();
    }
}

/// Listens for printf frames and prints reassembled lines.
pub struct Driver {
    inner: Arc<Inner>,
    source: Option<Box<dyn FrameSource>>,
}

impl Driver {
    /// Create a driver from configuration and its collaborators.
    pub fn new(
        config: &PrintfConfig,
        timer: Arc<dyn TimerFacility>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                can_id: config.can_id,
                flush_timeout: config.flush_timeout(),
                timer,
                sink,
                clock: Arc::new(timestamp::now),
                session: Mutex::new(Session {
                    assembler: LineAssembler::new(),
                    pending: None,
                    generation: 0,
                    state: DriverState::Idle,
                    last_error: None,
                }),
                counters: Counters::default(),
            }),
            source: None,
        }
    }

    /// Replace the wall-clock timestamp provider.
    ///
    /// Must be called before `start()`.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.clock = clock,
            None => {
                #[cfg(feature = "tracing-support")]
                tracing::warn!("Clock not replaced: driver already shared");
            }
        }
        self
    }

    /// Subscribe to the printf identifier on `source`.
    pub fn start(&mut self, mut source: Box<dyn FrameSource>) -> Result<()> {
        {
            let mut session = self.inner.lock();
            match session.state {
                DriverState::Listening => return Err(PrintfError::AlreadyStarted),
                DriverState::Stopped => return Err(PrintfError::Stopped),
                DriverState::Idle => {}
            }
            session.assembler.reset();
        }

        let weak = Arc::downgrade(&self.inner);
        let handler: FrameHandler = Arc::new(move |frame: Frame| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_frame(frame);
            }
        });
        source.subscribe(self.inner.can_id, handler)?;

        self.inner.lock().state = DriverState::Listening;

        #[cfg(feature = "tracing-support")]
        tracing::info!(
            "Listening for printf frames: ID=0x{:03X}, source={}, flush_timeout={:?}",
            self.inner.can_id,
            source.name(),
            self.inner.flush_timeout
        );

        self.source = Some(source);
        Ok(())
    }

    /// Feed one frame directly, bypassing any subscribed source.
    pub fn handle_frame(&self, frame: Frame) {
        self.inner.handle_frame(frame);
    }

    /// Feed raw payload bytes as if they arrived on the printf identifier.
    ///
    /// Returns `PrintfError::InvalidFrameLength` if `len > 8`; the frame is
    /// dropped and counted.
    pub fn ingest(&self, data: &[u8; 8], len: usize) -> Result<()> {
        let mut session = self.inner.lock();
        if session.state == DriverState::Stopped {
            return Err(PrintfError::Stopped);
        }
        self.inner.ingest(&mut session, data, len);
        if len > 8 {
            return Err(PrintfError::InvalidFrameLength(len));
        }
        Ok(())
    }

    /// Unsubscribe and cancel any pending idle flush.
    ///
    /// Idempotent. No line is written after this returns. A partial line
    /// still buffered is discarded.
    pub fn stop(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.unsubscribe();
        }
        self.inner.shutdown();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.inner.lock().state
    }

    /// Subscribed identifier.
    pub fn can_id(&self) -> u32 {
        self.inner.can_id
    }

    /// Partial line not yet emitted.
    pub fn pending_line(&self) -> String {
        self.inner.lock().assembler.pending().to_string()
    }

    /// Whether an idle flush is currently scheduled.
    pub fn is_flush_armed(&self) -> bool {
        self.inner.lock().pending.is_some()
    }

    /// Last per-event error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> DriverStats {
        self.inner.counters.snapshot()
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.stop();
    }
}
