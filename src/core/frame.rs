//! CAN frame as seen by the line reassembly path.

use crate::core::error::{PrintfError, Result};

/// Maximum payload of a classic CAN frame.
pub const MAX_DATA_LEN: usize = 8;

/// One received CAN frame - stack-allocated fixed buffer for up to 8 bytes.
///
/// Frames are transient: the driver consumes them in the delivery callback
/// and keeps nothing but the decoded characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Frame {
    can_id: u32,
    remote: bool,
    dlc: u8,
    data: [u8; MAX_DATA_LEN],
}

impl Frame {
    /// Create a data frame from a byte slice (copies up to 8 bytes).
    pub fn from_slice(can_id: u32, bytes: &[u8]) -> Self {
        let mut data = [0u8; MAX_DATA_LEN];
        let len = bytes.len().min(MAX_DATA_LEN);
        data[..len].copy_from_slice(&bytes[..len]);
        Self {
            can_id,
            remote: false,
            dlc: len as u8,
            data,
        }
    }

    /// Create a frame from its raw parts, validating the data length.
    pub fn from_parts(
        can_id: u32,
        remote: bool,
        dlc: usize,
        data: [u8; MAX_DATA_LEN],
    ) -> Result<Self> {
        if dlc > MAX_DATA_LEN {
            return Err(PrintfError::InvalidFrameLength(dlc));
        }
        Ok(Self {
            can_id,
            remote,
            dlc: dlc as u8,
            data,
        })
    }

    /// CAN identifier.
    pub fn can_id(&self) -> u32 {
        self.can_id
    }

    /// Remote transmission request flag. Carried but not interpreted.
    pub fn is_remote(&self) -> bool {
        self.remote
    }

    /// Declared data length.
    pub fn len(&self) -> usize {
        self.dlc as usize
    }

    /// Whether the frame carries no data bytes.
    pub fn is_empty(&self) -> bool {
        self.dlc == 0
    }

    /// Full 8-byte data field, including bytes past `len()`.
    pub fn raw_data(&self) -> &[u8; MAX_DATA_LEN] {
        &self.data
    }

    /// Valid data bytes.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_truncates_to_eight_bytes() {
        let frame = Frame::from_slice(0x580, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(frame.len(), 8);
        assert_eq!(frame.data(), &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(!frame.is_remote());
    }

    #[test]
    fn test_from_slice_short_payload() {
        let frame = Frame::from_slice(0x580, b"Hi");
        assert_eq!(frame.can_id(), 0x580);
        assert_eq!(frame.data(), b"Hi");
        assert_eq!(frame.raw_data(), &[b'H', b'i', 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_from_parts_rejects_length_over_eight() {
        let result = Frame::from_parts(0x580, false, 9, [0; 8]);
        assert!(matches!(result, Err(PrintfError::InvalidFrameLength(9))));
    }

    #[test]
    fn test_remote_frame_keeps_flag() {
        let frame = Frame::from_parts(0x580, true, 0, [0; 8]).unwrap();
        assert!(frame.is_remote());
        assert!(frame.is_empty());
    }
}
