//! The inbound stream message envelope: `[type: u8][length: u32][payload]`.
//!
//! Grounded on `original_source/sql/query_response_decoder.go`'s
//! `QueryStreamMessageType`, restated as an exhaustive Rust enum per the
//! REDESIGN FLAGS ("model message types ... as tagged sum variants, not
//! integer constants").

use crate::error::{LbError, LbResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    OpenConnection,
    CloseConnection,
    Error,
    Frame,
    FrameEntry,
}

impl MessageType {
    pub(crate) fn to_wire(self) -> u8 {
        match self {
            MessageType::OpenConnection => 0x01,
            MessageType::CloseConnection => 0x02,
            MessageType::Error => 0x03,
            MessageType::Frame => 0x04,
            MessageType::FrameEntry => 0x05,
        }
    }

    pub(crate) fn from_wire(code: u8) -> LbResult<Self> {
        Ok(match code {
            0x01 => MessageType::OpenConnection,
            0x02 => MessageType::CloseConnection,
            0x03 => MessageType::Error,
            0x04 => MessageType::Frame,
            0x05 => MessageType::FrameEntry,
            other => return Err(LbError::wire(format!("unknown message type 0x{other:02x}"))),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_message_types() {
        for (code, ty) in [
            (0x01u8, MessageType::OpenConnection),
            (0x02, MessageType::CloseConnection),
            (0x03, MessageType::Error),
            (0x04, MessageType::Frame),
            (0x05, MessageType::FrameEntry),
        ] {
            assert_eq!(MessageType::from_wire(code).unwrap(), ty);
            assert_eq!(ty.to_wire(), code);
        }
    }

    #[test]
    fn rejects_unknown_message_type() {
        assert!(MessageType::from_wire(0xff).is_err());
    }
}
