//! Collaborator traits consumed and produced by the driver.
//!
//! The line reassembly core never touches a CAN socket, a clock task or a
//! terminal directly. It goes through three seams:
//!
//! ```text
//! FrameSource   --frames-->  Driver  --lines-->  OutputSink
//!                              |
//!                        TimerFacility  (idle flush)
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::core::error::Result;
use crate::core::frame::Frame;

/// Callback invoked once per matching inbound frame, in delivery order.
pub type FrameHandler = Arc<dyn Fn(Frame) + Send + Sync>;

/// Single-shot timer callback.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Source of CAN frames (SocketCAN, replay, test harness).
pub trait FrameSource: Send {
    /// Start delivering frames whose identifier equals `can_id` to `handler`.
    fn subscribe(&mut self, can_id: u32, handler: FrameHandler) -> Result<()>;

    /// Stop delivery. Safe to call when not subscribed.
    fn unsubscribe(&mut self);

    /// Short human-readable name for logs.
    fn name(&self) -> &str {
        "frame-source"
    }
}

/// Opaque handle to a scheduled single-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Wrap a facility-specific id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Facility-specific id.
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Host timer facility.
pub trait TimerFacility: Send + Sync {
    /// Run `callback` once after `delay`.
    ///
    /// Returns `PrintfError::TimerScheduling` if the host cannot schedule.
    fn schedule_once(&self, delay: Duration, callback: TimerCallback) -> Result<TimerHandle>;

    /// Prevent a pending callback from firing. No-op if it already fired.
    fn cancel(&self, handle: TimerHandle);
}

/// Destination for rendered, timestamped lines.
pub trait OutputSink: Send + Sync {
    /// Append one rendered line.
    fn write(&self, text: &str);
}
