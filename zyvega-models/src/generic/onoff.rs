use crate::{Message, Model};
use heapless::Vec;
use zyvega_common::opcode::Opcode;
use zyvega_common::{opcode, InsufficientBuffer, ModelIdentifier, ParseError};

#[derive(Clone, Debug)]
pub struct GenericOnOffClient;

pub const GENERIC_ONOFF_SERVER: ModelIdentifier = ModelIdentifier::SIG(0x1000);
pub const GENERIC_ONOFF_CLIENT: ModelIdentifier = ModelIdentifier::SIG(0x1001);

opcode!( GENERIC_ON_OFF_SET_UNACKNOWLEDGE 0x82, 0x03 );
opcode!( GENERIC_ON_OFF_STATUS 0x82, 0x04 );

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GenericOnOffMessage {
    SetUnacknowledged(Set),
    Status(Status),
}

impl Message for GenericOnOffMessage {
    fn opcode(&self) -> Opcode {
        match self {
            GenericOnOffMessage::SetUnacknowledged(_) => GENERIC_ON_OFF_SET_UNACKNOWLEDGE,
            GenericOnOffMessage::Status(_) => GENERIC_ON_OFF_STATUS,
        }
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        match self {
            GenericOnOffMessage::SetUnacknowledged(inner) => inner.emit_parameters(xmit),
            GenericOnOffMessage::Status(inner) => inner.emit_parameters(xmit),
        }
    }
}

impl Model for GenericOnOffClient {
    const IDENTIFIER: ModelIdentifier = GENERIC_ONOFF_CLIENT;
    type Message = GenericOnOffMessage;

    fn parse(opcode: &Opcode, parameters: &[u8]) -> Result<Option<Self::Message>, ParseError> {
        match *opcode {
            GENERIC_ON_OFF_STATUS => Ok(Some(GenericOnOffMessage::Status(Status::parse(
                parameters,
            )?))),
            _ => {
                // not applicable to this role
                Ok(None)
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Set {
    pub on_off: u8,
    pub tid: u8,
}

impl Set {
    pub fn new(on: bool, tid: u8) -> Self {
        Self {
            on_off: on as u8,
            tid,
        }
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        xmit.push(self.on_off).map_err(|_| InsufficientBuffer)?;
        xmit.push(self.tid).map_err(|_| InsufficientBuffer)?;
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    pub present_on_off: u8,
    pub target_on_off: Option<u8>,
    pub remaining_time: Option<u8>,
}

impl From<Status> for GenericOnOffMessage {
    fn from(inner: Status) -> Self {
        GenericOnOffMessage::Status(inner)
    }
}

impl Status {
    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        xmit.push(self.present_on_off)
            .map_err(|_| InsufficientBuffer)?;
        if let (Some(target_on_off), Some(remaining_time)) =
            (self.target_on_off, self.remaining_time)
        {
            xmit.push(target_on_off).map_err(|_| InsufficientBuffer)?;
            xmit.push(remaining_time).map_err(|_| InsufficientBuffer)?;
        }
        Ok(())
    }

    fn parse(parameters: &[u8]) -> Result<Self, ParseError> {
        match parameters.len() {
            1 => Ok(Self {
                present_on_off: parameters[0],
                target_on_off: None,
                remaining_time: None,
            }),
            3 => Ok(Self {
                present_on_off: parameters[0],
                target_on_off: Some(parameters[1]),
                remaining_time: Some(parameters[2]),
            }),
            _ => Err(ParseError::InvalidLength),
        }
    }

    pub fn is_on(&self) -> bool {
        self.target_on_off.unwrap_or(self.present_on_off) != 0
    }
}
