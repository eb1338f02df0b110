#![cfg_attr(not(test), no_std)]

use core::fmt::{Display, Formatter};
use heapless::Vec;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod address;
pub mod opcode;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InsufficientBuffer;

impl From<()> for InsufficientBuffer {
    fn from(_: ()) -> Self {
        InsufficientBuffer
    }
}

impl From<u8> for InsufficientBuffer {
    fn from(_: u8) -> Self {
        InsufficientBuffer
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ParseError {
    InvalidPDUFormat,
    InvalidValue,
    InvalidLength,
    InsufficientBuffer,
}

impl From<()> for ParseError {
    fn from(_: ()) -> Self {
        Self::InsufficientBuffer
    }
}

impl From<InsufficientBuffer> for ParseError {
    fn from(_: InsufficientBuffer) -> Self {
        Self::InsufficientBuffer
    }
}

/// Mesh device identity, as advertised by an unprovisioned beacon.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Uuid(pub [u8; 16]);

impl Uuid {
    pub fn new(uuid: [u8; 16]) -> Self {
        Self(uuid)
    }

    /// Takes the leading 16 octets of `data`; scan results may carry
    /// trailing OOB information.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < 16 {
            return Err(ParseError::InvalidLength);
        }
        let mut uuid = [0; 16];
        uuid.copy_from_slice(&data[0..16]);
        Ok(Self(uuid))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl Display for Uuid {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Display::fmt(&uuid::Uuid::from_bytes(self.0).simple(), f)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Uuid {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{=[u8]:02x}", self.0)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CompanyIdentifier(pub u16);

impl Display for CompanyIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProductIdentifier(pub u16);

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VersionIdentifier(pub u16);

/// Feature bitmap of composition data page 0.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Features(pub u16);

impl Features {
    pub fn relay(&self) -> bool {
        self.0 & 0x01 != 0
    }

    pub fn proxy(&self) -> bool {
        self.0 & 0x02 != 0
    }

    pub fn friend(&self) -> bool {
        self.0 & 0x04 != 0
    }

    pub fn low_power(&self) -> bool {
        self.0 & 0x08 != 0
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ModelIdentifier {
    SIG(u16),
    Vendor(CompanyIdentifier, u16),
}

impl ModelIdentifier {
    /// Two octets are a SIG model, four octets a vendor model; both little-endian.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        match data.len() {
            2 => Ok(Self::SIG(u16::from_le_bytes([data[0], data[1]]))),
            4 => Ok(Self::Vendor(
                CompanyIdentifier(u16::from_le_bytes([data[0], data[1]])),
                u16::from_le_bytes([data[2], data[3]]),
            )),
            _ => Err(ParseError::InvalidLength),
        }
    }

    pub fn emit<const N: usize>(&self, xmit: &mut Vec<u8, N>) -> Result<(), InsufficientBuffer> {
        match self {
            ModelIdentifier::SIG(model_id) => {
                xmit.extend_from_slice(&model_id.to_le_bytes())?;
            }
            ModelIdentifier::Vendor(company_id, model_id) => {
                xmit.extend_from_slice(&company_id.0.to_le_bytes())?;
                xmit.extend_from_slice(&model_id.to_le_bytes())?;
            }
        }
        Ok(())
    }

    pub fn is_vendor(&self) -> bool {
        matches!(self, ModelIdentifier::Vendor(..))
    }
}

impl Display for ModelIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ModelIdentifier::SIG(model_id) => write!(f, "SIG({:#06x})", model_id),
            ModelIdentifier::Vendor(company_id, model_id) => {
                write!(f, "Vendor({}, {:#06x})", company_id, model_id)
            }
        }
    }
}
