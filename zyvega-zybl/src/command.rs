use crate::frame::MAX_PAYLOAD_LEN;
use crate::FrameError;
use core::fmt::{Display, Formatter};
use heapless::Vec;

/// Command identifier carried in every frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandId(pub u16);

impl CommandId {
    pub const BRIGHTNESS: CommandId = CommandId(0x1001);
    pub const CCT: CommandId = CommandId(0x1002);
    pub const SATURATION: CommandId = CommandId(0x1005);
    pub const CHROMA: CommandId = CommandId(0x1007);
    pub const HSI: CommandId = CommandId(0x100A);
    pub const BRIGHTNESS_MODE: CommandId = CommandId(0x100B);
    pub const VOLTAGE: CommandId = CommandId(0x2001);
    pub const DEVICE_INFO: CommandId = CommandId(0x2003);
    pub const DEVICE_ID: CommandId = CommandId(0x2005);
    pub const ONLINE: CommandId = CommandId(0xFFFF);

    pub fn name(&self) -> Option<&'static str> {
        match *self {
            Self::BRIGHTNESS => Some("brightness"),
            Self::CCT => Some("cct"),
            Self::SATURATION => Some("saturation"),
            Self::CHROMA => Some("chroma"),
            Self::HSI => Some("hsi"),
            Self::BRIGHTNESS_MODE => Some("brightness+mode"),
            Self::VOLTAGE => Some("voltage"),
            Self::DEVICE_INFO => Some("device_info"),
            Self::DEVICE_ID => Some("device_id"),
            Self::ONLINE => Some("online_status"),
            _ => None,
        }
    }

    /// Width of the typed value this command carries, used to pad queries.
    pub fn value_len(&self) -> Option<usize> {
        match *self {
            Self::BRIGHTNESS | Self::SATURATION => Some(4),
            Self::CCT | Self::VOLTAGE | Self::ONLINE => Some(2),
            Self::HSI => Some(10),
            Self::BRIGHTNESS_MODE => Some(5),
            _ => None,
        }
    }
}

impl Display for CommandId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:04x}", self.0),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Query = 0x00,
    Control = 0x01,
}

/// Typed value of a command, in its little-endian wire layout.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Value {
    /// Percent.
    Brightness(f32),
    /// Kelvin.
    Cct(u16),
    /// Percent.
    Saturation(f32),
    Hsi {
        hue: f32,
        saturation: f32,
        intensity: u16,
    },
    BrightnessMode {
        brightness: f32,
        mode: i8,
    },
    Voltage(u16),
    Online(bool),
    /// Layout unknown; carried as is.
    Raw(Vec<u8, MAX_PAYLOAD_LEN>),
}

impl Value {
    pub fn emit<const N: usize>(&self, xmit: &mut Vec<u8, N>) -> Result<(), FrameError> {
        let result = match self {
            Value::Brightness(percent) | Value::Saturation(percent) => {
                xmit.extend_from_slice(&percent.to_le_bytes())
            }
            Value::Cct(kelvin) => xmit.extend_from_slice(&kelvin.to_le_bytes()),
            Value::Hsi {
                hue,
                saturation,
                intensity,
            } => xmit
                .extend_from_slice(&hue.to_le_bytes())
                .and_then(|_| xmit.extend_from_slice(&saturation.to_le_bytes()))
                .and_then(|_| xmit.extend_from_slice(&intensity.to_le_bytes())),
            Value::BrightnessMode { brightness, mode } => xmit
                .extend_from_slice(&brightness.to_le_bytes())
                .and_then(|_| xmit.push(*mode as u8).map_err(|_| ())),
            Value::Voltage(voltage) => xmit.extend_from_slice(&voltage.to_le_bytes()),
            Value::Online(online) => xmit.extend_from_slice(&(*online as u16).to_le_bytes()),
            Value::Raw(raw) => xmit.extend_from_slice(raw),
        };
        result.map_err(|_| FrameError::Oversized)
    }

    /// Interprets `data` according to `command`. Unknown commands, and
    /// values shorter than their layout, come back as [`Value::Raw`].
    pub fn parse(command: CommandId, data: &[u8]) -> Value {
        let f32_at = |offset: usize| {
            f32::from_le_bytes([
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            ])
        };
        let u16_at = |offset: usize| u16::from_le_bytes([data[offset], data[offset + 1]]);

        match (command, data.len()) {
            (CommandId::BRIGHTNESS, len) if len >= 4 => Value::Brightness(f32_at(0)),
            (CommandId::CCT, len) if len >= 2 => Value::Cct(u16_at(0)),
            (CommandId::SATURATION, len) if len >= 4 => Value::Saturation(f32_at(0)),
            (CommandId::HSI, len) if len >= 10 => Value::Hsi {
                hue: f32_at(0),
                saturation: f32_at(4),
                intensity: u16_at(8),
            },
            (CommandId::BRIGHTNESS_MODE, len) if len >= 5 => Value::BrightnessMode {
                brightness: f32_at(0),
                mode: data[4] as i8,
            },
            (CommandId::VOLTAGE, len) if len >= 2 => Value::Voltage(u16_at(0)),
            (CommandId::ONLINE, len) if len >= 2 => Value::Online(u16_at(0) != 0),
            _ => {
                let len = data.len().min(MAX_PAYLOAD_LEN);
                Value::Raw(Vec::from_slice(&data[..len]).unwrap_or_default())
            }
        }
    }
}

/// `device_id ‖ 01 ‖ value`.
pub fn control_payload(
    device_id: u16,
    value: &Value,
) -> Result<Vec<u8, MAX_PAYLOAD_LEN>, FrameError> {
    let mut payload = Vec::new();
    payload
        .extend_from_slice(&device_id.to_le_bytes())
        .map_err(|_| FrameError::Oversized)?;
    payload
        .push(Direction::Control as u8)
        .map_err(|_| FrameError::Oversized)?;
    value.emit(&mut payload)?;
    Ok(payload)
}

/// `device_id ‖ 00 ‖ value_len zeros`.
pub fn query_payload(
    device_id: u16,
    value_len: usize,
) -> Result<Vec<u8, MAX_PAYLOAD_LEN>, FrameError> {
    let mut payload = Vec::new();
    payload
        .extend_from_slice(&device_id.to_le_bytes())
        .map_err(|_| FrameError::Oversized)?;
    payload
        .push(Direction::Query as u8)
        .map_err(|_| FrameError::Oversized)?;
    if payload.len() + value_len > MAX_PAYLOAD_LEN {
        return Err(FrameError::Oversized);
    }
    payload
        .resize(payload.len() + value_len, 0)
        .map_err(|_| FrameError::Oversized)?;
    Ok(payload)
}
