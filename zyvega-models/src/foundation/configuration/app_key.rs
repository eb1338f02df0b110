use crate::foundation::configuration::{ConfigurationMessage, NetKeyAppKeyIndexesPair};
use crate::{Message, Status};
use heapless::Vec;
use zyvega_common::opcode::Opcode;
use zyvega_common::{opcode, InsufficientBuffer, ParseError};

opcode!( CONFIG_APPKEY_STATUS 0x80, 0x03 );

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub enum AppKeyMessage {
    Status(AppKeyStatusMessage),
}

impl From<AppKeyMessage> for ConfigurationMessage {
    fn from(inner: AppKeyMessage) -> Self {
        Self::AppKey(inner)
    }
}

impl AppKeyMessage {
    pub fn parse_status(parameters: &[u8]) -> Result<Self, ParseError> {
        Ok(Self::Status(AppKeyStatusMessage::parse(parameters)?))
    }
}

impl Message for AppKeyMessage {
    fn opcode(&self) -> Opcode {
        match self {
            Self::Status(_) => CONFIG_APPKEY_STATUS,
        }
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        match self {
            AppKeyMessage::Status(inner) => inner.emit_parameters(xmit),
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub struct AppKeyStatusMessage {
    pub status: Status,
    pub indexes: NetKeyAppKeyIndexesPair,
}

impl From<AppKeyStatusMessage> for AppKeyMessage {
    fn from(inner: AppKeyStatusMessage) -> Self {
        Self::Status(inner)
    }
}

impl AppKeyStatusMessage {
    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        xmit.push(self.status.code())
            .map_err(|_| InsufficientBuffer)?;
        self.indexes.emit(xmit)?;
        Ok(())
    }

    fn parse(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() != 4 {
            return Err(ParseError::InvalidLength);
        }
        let status = Status::from(parameters[0]);
        let indexes = NetKeyAppKeyIndexesPair::parse(&parameters[1..=3])?;
        Ok(Self { status, indexes })
    }
}
