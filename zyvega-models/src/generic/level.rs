use crate::{Message, Model};
use heapless::Vec;
use zyvega_common::opcode::Opcode;
use zyvega_common::{opcode, InsufficientBuffer, ModelIdentifier, ParseError};

#[derive(Clone, Debug)]
pub struct GenericLevelClient;

pub const GENERIC_LEVEL_SERVER: ModelIdentifier = ModelIdentifier::SIG(0x1002);
pub const GENERIC_LEVEL_CLIENT: ModelIdentifier = ModelIdentifier::SIG(0x1003);

opcode!( GENERIC_LEVEL_SET 0x82, 0x06 );
opcode!( GENERIC_LEVEL_STATUS 0x82, 0x08 );

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GenericLevelMessage {
    Set(GenericLevelSet),
    Status(GenericLevelStatus),
}

impl Message for GenericLevelMessage {
    fn opcode(&self) -> Opcode {
        match self {
            GenericLevelMessage::Set(_) => GENERIC_LEVEL_SET,
            GenericLevelMessage::Status(_) => GENERIC_LEVEL_STATUS,
        }
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        match self {
            GenericLevelMessage::Set(inner) => inner.emit_parameters(xmit),
            GenericLevelMessage::Status(inner) => inner.emit_parameters(xmit),
        }
    }
}

impl Model for GenericLevelClient {
    const IDENTIFIER: ModelIdentifier = GENERIC_LEVEL_CLIENT;
    type Message = GenericLevelMessage;

    fn parse(opcode: &Opcode, parameters: &[u8]) -> Result<Option<Self::Message>, ParseError> {
        match *opcode {
            GENERIC_LEVEL_STATUS => Ok(Some(GenericLevelMessage::Status(
                GenericLevelStatus::parse(parameters)?,
            ))),
            _ => {
                // not applicable to this role
                Ok(None)
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GenericLevelSet {
    pub level: i16,
    pub tid: u8,
}

impl GenericLevelSet {
    /// Maps 0..=100 percent onto the full level range, 0% being -32768.
    pub fn from_percent(percent: u8, tid: u8) -> Self {
        let level = (percent as f32 / 100.0) * 65535.0 - 32768.0;
        Self {
            level: level as i16,
            tid,
        }
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        xmit.extend_from_slice(&self.level.to_le_bytes()[..])
            .map_err(|_| InsufficientBuffer)?;
        xmit.push(self.tid).map_err(|_| InsufficientBuffer)?;
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GenericLevelStatus {
    pub present_level: i16,
    pub target_level: Option<i16>,
    pub remaining_time: Option<u8>,
}

impl From<GenericLevelStatus> for GenericLevelMessage {
    fn from(inner: GenericLevelStatus) -> Self {
        GenericLevelMessage::Status(inner)
    }
}

impl GenericLevelStatus {
    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        xmit.extend_from_slice(&self.present_level.to_le_bytes()[..])
            .map_err(|_| InsufficientBuffer)?;

        if let Some(target_level) = self.target_level {
            xmit.extend_from_slice(&target_level.to_le_bytes()[..])
                .map_err(|_| InsufficientBuffer)?;
        }

        if let Some(remaining_time) = self.remaining_time {
            xmit.push(remaining_time).map_err(|_| InsufficientBuffer)?;
        }
        Ok(())
    }

    fn parse(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() >= 2 {
            let present_level: i16 = i16::from_le_bytes([parameters[0], parameters[1]]);
            let target_level = if parameters.len() >= 4 {
                Some(i16::from_le_bytes([parameters[2], parameters[3]]))
            } else {
                None
            };
            let remaining_time = if parameters.len() >= 5 {
                Some(parameters[4])
            } else {
                None
            };
            Ok(Self {
                present_level,
                target_level,
                remaining_time,
            })
        } else {
            Err(ParseError::InvalidLength)
        }
    }

    /// Present level expressed as 0..=100 percent.
    pub fn percent(&self) -> u8 {
        let percent = (self.present_level as i32 + 32768) * 100 / 65535;
        percent as u8
    }
}
