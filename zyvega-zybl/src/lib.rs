//! ZYBL, the framing used to drive Zhiyun lights directly over their
//! vendor GATT service.
//!
//! ```text
//! offset 0   24 3C         header
//! offset 2   u8            length of the data section
//! offset 3   00            reserved
//! offset 4   u16 0x0100    data section start
//! offset 6   u16           sequence
//! offset 8   u16           command id
//! offset 10  ..            payload
//!            u16           CRC-16/XMODEM over the data section
//! ```
//!
//! All integers are little-endian.
#![cfg_attr(not(test), no_std)]

mod crc;
mod error;

pub mod command;
pub mod frame;
pub mod response;

pub use command::{CommandId, Value};
pub use crc::crc16_xmodem;
pub use error::FrameError;
pub use frame::{decode_frame, encode_frame, Frame, Sequence};
pub use response::Response;
