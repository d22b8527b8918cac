//! # canprintf
//!
//! Reassembles printf-style debug output that an embedded device sends over
//! CAN into timestamped text lines.
//!
//! ## Features
//!
//! - **Line reassembly**: payloads of up to 8 bytes are joined and split on
//!   NUL, LF and CR
//! - **Idle flush**: a line without terminator is printed after 1000 ms
//! - **Pluggable collaborators**: frame source, timer and output sink are traits
//! - **SocketCAN**: ready-made frame source on Linux
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use canprintf::prelude::*;
//!
//! let config = PrintfConfig::default();
//! let mut driver = Driver::new(&config, Arc::new(TokioTimer::new()), Arc::new(StdoutSink));
//! driver.start(Box::new(SocketCanSource::new(&config.interface, config.rx_poll_interval_ms)))?;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod assembler;
pub mod config;
pub mod core;
pub mod driver;
pub mod protocols;
pub mod sink;
pub mod timer;
pub mod timestamp;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::assembler::{Emission, FlushRequest, LineAssembler};
    pub use crate::config::PrintfConfig;
    pub use crate::core::{
        error::{PrintfError, Result},
        frame::Frame,
        traits::*,
    };
    pub use crate::driver::{Driver, DriverState, DriverStats};
    pub use crate::sink::{MemorySink, StdoutSink};
    pub use crate::timer::TokioTimer;

    #[cfg(target_os = "linux")]
    pub use crate::protocols::can::SocketCanSource;
}

// Re-export core types at crate root for convenience
pub use crate::assembler::LineAssembler;
pub use crate::config::{PrintfConfig, PRINTF_CAN_ID};
pub use crate::core::error::{PrintfError, Result};
pub use crate::core::frame::Frame;
pub use crate::driver::Driver;
