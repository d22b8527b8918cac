//! SocketCAN transport (Linux only).
//!
//! Passively listens on a CAN interface and delivers the frames of one
//! identifier to a [`FrameSource`](crate::core::traits::FrameSource)
//! subscriber.
//!
//! ## Dependencies
//!
//! This module uses:
//! - [`socketcan`](https://crates.io/crates/socketcan) for CAN bus communication
//!
//! ## Example
//!
//! ```rust,ignore
//! use canprintf::protocols::can::SocketCanSource;
//!
//! let mut source = SocketCanSource::new("vcan0", 10);
//! source.subscribe(0x580, Arc::new(|frame| println!("{:02X?}", frame.data())))?;
//! ```

mod client;

pub use client::SocketCanSource;
