#![cfg_attr(not(test), no_std)]

use heapless::Vec;
use zyvega_common::opcode::Opcode;
use zyvega_common::{InsufficientBuffer, ModelIdentifier, ParseError};

pub mod foundation;
pub mod generic;
pub mod vendor;

/// Largest access payload a single mesh message may carry.
pub const MAX_ACCESS_PAYLOAD: usize = 380;

#[cfg(feature = "defmt")]
pub trait Message: defmt::Format {
    fn opcode(&self) -> Opcode;
    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer>;

    /// Opcode followed by parameters, ready for the access layer.
    fn emit<const N: usize>(&self, xmit: &mut Vec<u8, N>) -> Result<(), InsufficientBuffer> {
        self.opcode().emit(xmit)?;
        self.emit_parameters(xmit)
    }
}

#[cfg(not(feature = "defmt"))]
pub trait Message {
    fn opcode(&self) -> Opcode;
    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer>;

    /// Opcode followed by parameters, ready for the access layer.
    fn emit<const N: usize>(&self, xmit: &mut Vec<u8, N>) -> Result<(), InsufficientBuffer> {
        self.opcode().emit(xmit)?;
        self.emit_parameters(xmit)
    }
}

pub trait Model {
    const IDENTIFIER: ModelIdentifier;
    type Message: Message;

    /// `Ok(None)` when the opcode does not belong to this model's role.
    fn parse(opcode: &Opcode, parameters: &[u8]) -> Result<Option<Self::Message>, ParseError>;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    Success,
    InvalidAddress,
    InvalidModel,
    InvalidAppKeyIndex,
    InvalidNetKeyIndex,
    InsufficientResources,
    KeyIndexAlreadyStored,
    InvalidPublishParameters,
    NotASubscribeModel,
    StorageFailure,
    FeatureNotSupported,
    CannotUpdate,
    CannotRemove,
    CannotBind,
    TemporarilyUnableToChangeState,
    CannotSet,
    UnspecifiedError,
    InvalidBinding,
    /// A code outside the known table, kept as sent.
    Other(u8),
}

impl Status {
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Success => 0x00,
            Self::InvalidAddress => 0x01,
            Self::InvalidModel => 0x02,
            Self::InvalidAppKeyIndex => 0x03,
            Self::InvalidNetKeyIndex => 0x04,
            Self::InsufficientResources => 0x05,
            Self::KeyIndexAlreadyStored => 0x06,
            Self::InvalidPublishParameters => 0x07,
            Self::NotASubscribeModel => 0x08,
            Self::StorageFailure => 0x09,
            Self::FeatureNotSupported => 0x0A,
            Self::CannotUpdate => 0x0B,
            Self::CannotRemove => 0x0C,
            Self::CannotBind => 0x0D,
            Self::TemporarilyUnableToChangeState => 0x0E,
            Self::CannotSet => 0x0F,
            Self::UnspecifiedError => 0x10,
            Self::InvalidBinding => 0x11,
            Self::Other(code) => *code,
        }
    }
}

impl From<u8> for Status {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Success,
            0x01 => Self::InvalidAddress,
            0x02 => Self::InvalidModel,
            0x03 => Self::InvalidAppKeyIndex,
            0x04 => Self::InvalidNetKeyIndex,
            0x05 => Self::InsufficientResources,
            0x06 => Self::KeyIndexAlreadyStored,
            0x07 => Self::InvalidPublishParameters,
            0x08 => Self::NotASubscribeModel,
            0x09 => Self::StorageFailure,
            0x0A => Self::FeatureNotSupported,
            0x0B => Self::CannotUpdate,
            0x0C => Self::CannotRemove,
            0x0D => Self::CannotBind,
            0x0E => Self::TemporarilyUnableToChangeState,
            0x0F => Self::CannotSet,
            0x10 => Self::UnspecifiedError,
            0x11 => Self::InvalidBinding,
            other => Self::Other(other),
        }
    }
}
