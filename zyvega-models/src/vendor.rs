//! Zhiyun vendor model messages.
//!
//! Parameters are big-endian, unlike the rest of the access layer.

use crate::Message;
use heapless::Vec;
use zyvega_common::opcode::Opcode;
use zyvega_common::{CompanyIdentifier, InsufficientBuffer, ParseError};

pub const ZHIYUN_COMPANY: CompanyIdentifier = CompanyIdentifier(0x0905);

/// Light command identifiers the vendor opcodes are derived from.
pub const COMMAND_COLOR_TEMPERATURE: u16 = 0x1002;
pub const COMMAND_RGB: u16 = 0x1003;

pub const KELVIN_MIN: u16 = 2700;
pub const KELVIN_MAX: u16 = 6500;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ZhiyunCommand {
    ColorTemperature {
        kelvin: u16,
    },
    Rgb {
        /// Brightness in hundredths of a percent.
        brightness: u16,
        r: u8,
        g: u8,
        b: u8,
    },
}

impl ZhiyunCommand {
    pub fn rgb(percent: u8, r: u8, g: u8, b: u8) -> Self {
        Self::Rgb {
            brightness: percent as u16 * 100,
            r,
            g,
            b,
        }
    }

    pub fn command_id(&self) -> u16 {
        match self {
            Self::ColorTemperature { .. } => COMMAND_COLOR_TEMPERATURE,
            Self::Rgb { .. } => COMMAND_RGB,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ZhiyunMessage {
    pub company: CompanyIdentifier,
    pub device_id: u16,
    pub command: ZhiyunCommand,
}

impl Message for ZhiyunMessage {
    fn opcode(&self) -> Opcode {
        Opcode::vendor(self.command.command_id() as u8, self.company)
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        xmit.extend_from_slice(&self.device_id.to_be_bytes())?;
        match self.command {
            ZhiyunCommand::ColorTemperature { kelvin } => {
                xmit.extend_from_slice(&kelvin.to_be_bytes())?;
            }
            ZhiyunCommand::Rgb { brightness, r, g, b } => {
                xmit.extend_from_slice(&brightness.to_be_bytes())?;
                xmit.extend_from_slice(&[r, g, b])?;
            }
        }
        Ok(())
    }
}

/// An inbound vendor message, split but not interpreted.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct VendorMessage<'a> {
    pub opcode: u8,
    pub company: CompanyIdentifier,
    pub parameters: &'a [u8],
}

impl<'a> VendorMessage<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, ParseError> {
        match Opcode::split(data) {
            Some((Opcode::ThreeOctet(opcode, lo, hi), parameters)) => Ok(Self {
                opcode: opcode & 0x3F,
                company: CompanyIdentifier(u16::from_le_bytes([lo, hi])),
                parameters,
            }),
            Some(_) => Err(ParseError::InvalidValue),
            None => Err(ParseError::InvalidPDUFormat),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_temperature_is_big_endian() {
        let message = ZhiyunMessage {
            company: ZHIYUN_COMPANY,
            device_id: 0x0380,
            command: ZhiyunCommand::ColorTemperature { kelvin: 5600 },
        };
        let mut xmit: Vec<u8, 16> = Vec::new();
        message.emit(&mut xmit).unwrap();
        assert_eq!(&xmit[..], &[0xC2, 0x05, 0x09, 0x03, 0x80, 0x15, 0xE0]);
    }

    #[test]
    fn rgb_scales_brightness() {
        let message = ZhiyunMessage {
            company: ZHIYUN_COMPANY,
            device_id: 0x0380,
            command: ZhiyunCommand::rgb(50, 0xFF, 0x10, 0x00),
        };
        let mut xmit: Vec<u8, 16> = Vec::new();
        message.emit(&mut xmit).unwrap();
        assert_eq!(
            &xmit[..],
            &[0xC3, 0x05, 0x09, 0x03, 0x80, 0x13, 0x88, 0xFF, 0x10, 0x00]
        );
    }

    #[test]
    fn parse_inbound_vendor_message() {
        let message = VendorMessage::parse(&[0xC2, 0x05, 0x09, 0xAA, 0xBB]).unwrap();
        assert_eq!(message.opcode, 0x02);
        assert_eq!(message.company, ZHIYUN_COMPANY);
        assert_eq!(message.parameters, &[0xAA, 0xBB]);

        assert_eq!(
            VendorMessage::parse(&[0x82, 0x04, 0x01]),
            Err(ParseError::InvalidValue)
        );
        assert_eq!(
            VendorMessage::parse(&[0xC2, 0x05]),
            Err(ParseError::InvalidPDUFormat)
        );
    }
}
