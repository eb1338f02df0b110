use crate::command::CommandId;
use crate::crc::crc16_xmodem;
use crate::FrameError;
use heapless::Vec;

pub const HEADER: [u8; 2] = [0x24, 0x3C];
const FIELD1: u16 = 0x0100;

/// Octets of the data section ahead of the payload.
const DATA_PREFIX_LEN: usize = 6;
/// Header, length and reserved octets.
const ENVELOPE_LEN: usize = 4;
const CRC_LEN: usize = 2;

pub const MIN_FRAME_LEN: usize = ENVELOPE_LEN + DATA_PREFIX_LEN;
pub const MAX_DATA_LEN: usize = u8::MAX as usize;
pub const MAX_PAYLOAD_LEN: usize = MAX_DATA_LEN - DATA_PREFIX_LEN;
pub const MAX_FRAME_LEN: usize = ENVELOPE_LEN + MAX_DATA_LEN + CRC_LEN;

#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    pub sequence: u16,
    pub command: CommandId,
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
}

impl Frame {
    pub fn new(command: CommandId, payload: &[u8], sequence: u16) -> Result<Self, FrameError> {
        Ok(Self {
            sequence,
            command,
            payload: Vec::from_slice(payload).map_err(|_| FrameError::Oversized)?,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8, MAX_FRAME_LEN>, FrameError> {
        encode_frame(self.command, &self.payload, self.sequence)
    }
}

/// Builds a complete frame: envelope, data section and CRC.
pub fn encode_frame(
    command: CommandId,
    payload: &[u8],
    sequence: u16,
) -> Result<Vec<u8, MAX_FRAME_LEN>, FrameError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::Oversized);
    }
    let data_len = DATA_PREFIX_LEN + payload.len();

    let mut frame: Vec<u8, MAX_FRAME_LEN> = Vec::new();
    frame
        .extend_from_slice(&HEADER)
        .and_then(|_| frame.extend_from_slice(&[data_len as u8, 0x00]))
        .and_then(|_| frame.extend_from_slice(&FIELD1.to_le_bytes()))
        .and_then(|_| frame.extend_from_slice(&sequence.to_le_bytes()))
        .and_then(|_| frame.extend_from_slice(&command.0.to_le_bytes()))
        .and_then(|_| frame.extend_from_slice(payload))
        .map_err(|_| FrameError::Oversized)?;

    let crc = crc16_xmodem(&frame[ENVELOPE_LEN..]);
    frame
        .extend_from_slice(&crc.to_le_bytes())
        .map_err(|_| FrameError::Oversized)?;
    Ok(frame)
}

/// Parses a frame, checking structure before the CRC and the CRC before
/// the data section contents.
pub fn decode_frame(raw: &[u8]) -> Result<Frame, FrameError> {
    if raw.len() < MIN_FRAME_LEN {
        return Err(FrameError::TooShort);
    }
    if raw[0..2] != HEADER {
        return Err(FrameError::BadHeader);
    }
    let data_len = raw[2] as usize;
    if raw.len() < data_len + ENVELOPE_LEN + CRC_LEN {
        return Err(FrameError::Truncated);
    }

    let data = &raw[ENVELOPE_LEN..ENVELOPE_LEN + data_len];
    let received = u16::from_le_bytes([
        raw[ENVELOPE_LEN + data_len],
        raw[ENVELOPE_LEN + data_len + 1],
    ]);
    let computed = crc16_xmodem(data);
    if received != computed {
        return Err(FrameError::CrcMismatch { received, computed });
    }

    if data.len() < DATA_PREFIX_LEN {
        return Err(FrameError::Malformed);
    }
    let sequence = u16::from_le_bytes([data[2], data[3]]);
    let command = CommandId(u16::from_le_bytes([data[4], data[5]]));
    Frame::new(command, &data[DATA_PREFIX_LEN..], sequence)
}

/// Per-connection sequence numbers: 1 first, wrapping from 65535 back to 1.
#[derive(Copy, Clone, Debug, Default)]
pub struct Sequence {
    last: u16,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> u16 {
        self.last = match self.last {
            u16::MAX => 1,
            last => last + 1,
        };
        self.last
    }

    pub fn reset(&mut self) {
        self.last = 0;
    }
}
