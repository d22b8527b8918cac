//! Core abstractions: errors, frames and collaborator traits.

pub mod error;
pub mod frame;
pub mod traits;

pub use error::{PrintfError, Result};
pub use frame::{Frame, MAX_DATA_LEN};
pub use traits::*;
