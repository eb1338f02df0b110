use crate::command::{CommandId, Value};
use crate::frame::MAX_PAYLOAD_LEN;
use core::fmt::{Display, Formatter};
use heapless::{String, Vec};

/// Longest serial or model string kept from a device-info response.
pub const MAX_INFO_LEN: usize = 32;

/// A decoded notification payload.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    DeviceInfo {
        serial: String<MAX_INFO_LEN>,
        model: String<MAX_INFO_LEN>,
    },
    /// `device_id ‖ flag ‖ value`, the shape of every control and query
    /// reply.
    Reply {
        command: CommandId,
        device_id: u16,
        flag: u8,
        value: Value,
    },
    /// Too short to interpret.
    Opaque {
        command: CommandId,
        payload: Vec<u8, MAX_PAYLOAD_LEN>,
    },
}

impl Response {
    pub fn decode(command: CommandId, payload: &[u8]) -> Self {
        if command == CommandId::DEVICE_INFO {
            let mut strings = payload.split(|b| *b == 0).filter(|s| !s.is_empty());
            if let (Some(serial), Some(model)) = (strings.next(), strings.next()) {
                return Response::DeviceInfo {
                    serial: ascii(serial),
                    model: ascii(model),
                };
            }
        } else if payload.len() >= 3 {
            return Response::Reply {
                command,
                device_id: u16::from_le_bytes([payload[0], payload[1]]),
                flag: payload[2],
                value: Value::parse(command, &payload[3..]),
            };
        }

        let len = payload.len().min(MAX_PAYLOAD_LEN);
        Response::Opaque {
            command,
            payload: Vec::from_slice(&payload[..len]).unwrap_or_default(),
        }
    }

    pub fn command(&self) -> CommandId {
        match self {
            Response::DeviceInfo { .. } => CommandId::DEVICE_INFO,
            Response::Reply { command, .. } | Response::Opaque { command, .. } => *command,
        }
    }

    /// Device the response speaks for, when it carries one.
    pub fn device_id(&self) -> Option<u16> {
        match self {
            Response::Reply { device_id, .. } => Some(*device_id),
            _ => None,
        }
    }
}

fn ascii(data: &[u8]) -> String<MAX_INFO_LEN> {
    let mut s = String::new();
    for b in data {
        let c = if b.is_ascii() && !b.is_ascii_control() {
            *b as char
        } else {
            char::REPLACEMENT_CHARACTER
        };
        if s.push(c).is_err() {
            break;
        }
    }
    s
}

struct Hex<'a>(&'a [u8]);

impl Display for Hex<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Response::DeviceInfo { serial, model } => {
                write!(f, "[{}] serial={} model={}", CommandId::DEVICE_INFO, serial, model)
            }
            Response::Opaque { command, payload } => {
                write!(f, "[{}] payload={}", command, Hex(payload))
            }
            Response::Reply {
                command,
                device_id,
                flag,
                value,
            } => {
                write!(f, "[{}] device={} ", command, device_id)?;
                match value {
                    Value::Brightness(percent) => write!(f, "brightness={:.0}%", percent),
                    Value::Cct(kelvin) => write!(f, "cct={}K", kelvin),
                    Value::Saturation(percent) => write!(f, "saturation={:.0}%", percent),
                    Value::Hsi {
                        hue,
                        saturation,
                        intensity,
                    } => write!(
                        f,
                        "hue={:.1} sat={:.0}% intensity={}",
                        hue, saturation, intensity
                    ),
                    Value::BrightnessMode { brightness, mode } => {
                        write!(f, "brightness={:.0}% mode={}", brightness, mode)
                    }
                    Value::Voltage(voltage) => write!(f, "voltage={}", voltage),
                    Value::Online(online) => write!(f, "online={}", online),
                    Value::Raw(raw) => write!(f, "flag={:#x} value={}", flag, Hex(raw)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(device_id: u16, value: &[u8]) -> Vec<u8, 32> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&device_id.to_le_bytes()).unwrap();
        payload.push(0x01).unwrap();
        payload.extend_from_slice(value).unwrap();
        payload
    }

    #[test]
    fn brightness() {
        let response = Response::decode(
            CommandId::BRIGHTNESS,
            &reply(0, &75.0f32.to_le_bytes()),
        );
        assert_eq!(response.to_string(), "[brightness] device=0 brightness=75%");
        assert_eq!(response.device_id(), Some(0));
    }

    #[test]
    fn cct_and_hsi() {
        let response = Response::decode(CommandId::CCT, &reply(0x0380, &5600u16.to_le_bytes()));
        assert_eq!(response.to_string(), "[cct] device=896 cct=5600K");

        let mut hsi: Vec<u8, 10> = Vec::new();
        hsi.extend_from_slice(&120.5f32.to_le_bytes()).unwrap();
        hsi.extend_from_slice(&80.0f32.to_le_bytes()).unwrap();
        hsi.extend_from_slice(&700u16.to_le_bytes()).unwrap();
        let response = Response::decode(CommandId::HSI, &reply(1, &hsi));
        assert_eq!(
            response.to_string(),
            "[hsi] device=1 hue=120.5 sat=80% intensity=700"
        );
    }

    #[test]
    fn online_status() {
        let response = Response::decode(CommandId::ONLINE, &reply(2, &[0x01, 0x00]));
        assert_eq!(response.to_string(), "[online_status] device=2 online=true");
    }

    #[test]
    fn device_info() {
        let response = Response::decode(CommandId::DEVICE_INFO, b"ZY123456\0VEGA-60\0\0");
        assert_eq!(response.to_string(), "[device_info] serial=ZY123456 model=VEGA-60");
        assert_eq!(response.command(), CommandId::DEVICE_INFO);
    }

    #[test]
    fn device_info_missing_model() {
        let response = Response::decode(CommandId::DEVICE_INFO, b"ZY1\0");
        assert_eq!(response.to_string(), "[device_info] payload=5a593100");
    }

    #[test]
    fn chroma_and_unknown_are_hex() {
        let response = Response::decode(CommandId::CHROMA, &reply(0, &[0xDE, 0xAD]));
        assert_eq!(
            response.to_string(),
            "[chroma] device=0 flag=0x1 value=dead"
        );

        let response = Response::decode(CommandId(0x3001), &[0xBE, 0xEF]);
        assert_eq!(response.to_string(), "[0x3001] payload=beef");
        assert_eq!(response.device_id(), None);
    }
}
