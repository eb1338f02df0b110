use crate::foundation::configuration::app_key::{AppKeyMessage, CONFIG_APPKEY_STATUS};
use crate::foundation::configuration::composition_data::{
    CompositionDataMessage, CONFIG_COMPOSITION_DATA_STATUS,
};
use crate::foundation::configuration::model_app::{ModelAppMessage, CONFIG_MODEL_APP_STATUS};
use crate::foundation::configuration::node_reset::{NodeResetMessage, CONFIG_NODE_RESET_STATUS};
use crate::{Message, Model};
use heapless::Vec;
use zyvega_common::opcode::Opcode;
use zyvega_common::{InsufficientBuffer, ModelIdentifier, ParseError};

pub mod app_key;
pub mod composition_data;
pub mod model_app;
pub mod node_reset;

pub const CONFIGURATION_SERVER: ModelIdentifier = ModelIdentifier::SIG(0x0000);
pub const CONFIGURATION_CLIENT: ModelIdentifier = ModelIdentifier::SIG(0x0001);

/// Configuration messages exchanged with a node under its device key.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub enum ConfigurationMessage {
    NodeReset(NodeResetMessage),
    CompositionData(CompositionDataMessage),
    AppKey(AppKeyMessage),
    ModelApp(ModelAppMessage),
}

impl Message for ConfigurationMessage {
    fn opcode(&self) -> Opcode {
        match self {
            ConfigurationMessage::NodeReset(inner) => inner.opcode(),
            ConfigurationMessage::CompositionData(inner) => inner.opcode(),
            ConfigurationMessage::AppKey(inner) => inner.opcode(),
            ConfigurationMessage::ModelApp(inner) => inner.opcode(),
        }
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        match self {
            ConfigurationMessage::NodeReset(inner) => inner.emit_parameters(xmit),
            ConfigurationMessage::CompositionData(inner) => inner.emit_parameters(xmit),
            ConfigurationMessage::AppKey(inner) => inner.emit_parameters(xmit),
            ConfigurationMessage::ModelApp(inner) => inner.emit_parameters(xmit),
        }
    }
}

/// The provisioner's side of the configuration model: parses the status
/// messages a node returns.
#[derive(Clone, Debug, Default)]
pub struct ConfigurationClient;

impl Model for ConfigurationClient {
    const IDENTIFIER: ModelIdentifier = CONFIGURATION_CLIENT;
    type Message = ConfigurationMessage;

    fn parse(opcode: &Opcode, parameters: &[u8]) -> Result<Option<Self::Message>, ParseError> {
        match *opcode {
            CONFIG_COMPOSITION_DATA_STATUS => Ok(Some(ConfigurationMessage::CompositionData(
                CompositionDataMessage::parse_status(parameters)?,
            ))),
            CONFIG_APPKEY_STATUS => Ok(Some(ConfigurationMessage::AppKey(
                AppKeyMessage::parse_status(parameters)?,
            ))),
            CONFIG_MODEL_APP_STATUS => Ok(Some(ConfigurationMessage::ModelApp(
                ModelAppMessage::parse_status(parameters)?,
            ))),
            CONFIG_NODE_RESET_STATUS => Ok(Some(ConfigurationMessage::NodeReset(
                NodeResetMessage::parse_status(parameters)?,
            ))),
            _ => Ok(None),
        }
    }
}

// ------------------------------------------------------------------------
// ------------------------------------------------------------------------

/// 12-bit global key index.
#[derive(PartialEq, Eq, PartialOrd, Copy, Clone, Debug, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct KeyIndex(u16);

#[cfg(feature = "defmt")]
impl defmt::Format for KeyIndex {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self.0);
    }
}

impl KeyIndex {
    pub fn new(index: u16) -> Self {
        Self(index & 0x0FFF)
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    fn parse_one(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() >= 2 {
            Ok(Self(
                u16::from_le_bytes([parameters[0], parameters[1]]) & 0x0FFF,
            ))
        } else {
            Err(ParseError::InvalidLength)
        }
    }

    fn emit_one<const N: usize>(
        index: &KeyIndex,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        xmit.extend_from_slice(&index.0.to_le_bytes())?;
        Ok(())
    }

    /// Two indexes packed into three octets, the first in the low 12 bits.
    fn parse_two(parameters: &[u8]) -> Result<(Self, Self), ParseError> {
        if parameters.len() >= 3 {
            let packed = u32::from_le_bytes([parameters[0], parameters[1], parameters[2], 0]);
            Ok((
                Self((packed & 0x0FFF) as u16),
                Self(((packed >> 12) & 0x0FFF) as u16),
            ))
        } else {
            Err(ParseError::InvalidLength)
        }
    }

    fn emit_two<const N: usize>(
        indexes: (&KeyIndex, &KeyIndex),
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        let packed = (indexes.0 .0 as u32) | ((indexes.1 .0 as u32) << 12);
        let bytes = packed.to_le_bytes();
        xmit.extend_from_slice(&bytes[0..3])?;
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Eq, PartialEq, PartialOrd, Copy, Clone, Debug, Hash, Default)]
pub struct NetKeyIndex(KeyIndex);

impl NetKeyIndex {
    pub fn new(index: u16) -> Self {
        Self(KeyIndex::new(index))
    }

    pub fn value(&self) -> u16 {
        self.0.value()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for NetKeyIndex {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self.0)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(PartialEq, Eq, PartialOrd, Copy, Clone, Debug, Hash, Default)]
pub struct AppKeyIndex(KeyIndex);

impl AppKeyIndex {
    pub fn new(index: u16) -> Self {
        Self(KeyIndex::new(index))
    }

    pub fn value(&self) -> u16 {
        self.0.value()
    }

    fn parse(parameters: &[u8]) -> Result<Self, ParseError> {
        Ok(Self(KeyIndex::parse_one(parameters)?))
    }

    fn emit<const N: usize>(&self, xmit: &mut Vec<u8, N>) -> Result<(), InsufficientBuffer> {
        KeyIndex::emit_one(&self.0, xmit)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AppKeyIndex {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NetKeyAppKeyIndexesPair(NetKeyIndex, AppKeyIndex);

impl NetKeyAppKeyIndexesPair {
    pub fn new(net_key: NetKeyIndex, app_key: AppKeyIndex) -> Self {
        Self(net_key, app_key)
    }

    fn emit<const N: usize>(&self, xmit: &mut Vec<u8, N>) -> Result<(), InsufficientBuffer> {
        KeyIndex::emit_two((&self.0 .0, &self.1 .0), xmit)
    }

    pub fn parse(parameters: &[u8]) -> Result<Self, ParseError> {
        if parameters.len() == 3 {
            let (net_key, app_key) = KeyIndex::parse_two(parameters)?;
            Ok(Self(NetKeyIndex(net_key), AppKeyIndex(app_key)))
        } else {
            Err(ParseError::InvalidLength)
        }
    }

    pub fn net_key(&self) -> NetKeyIndex {
        self.0
    }

    pub fn app_key(&self) -> AppKeyIndex {
        self.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_index_pair_packs_little_endian() {
        let pair = NetKeyAppKeyIndexesPair::new(NetKeyIndex::new(0x123), AppKeyIndex::new(0x456));
        let mut xmit: Vec<u8, 3> = Vec::new();
        pair.emit(&mut xmit).unwrap();
        assert_eq!(&xmit[..], &[0x23, 0x61, 0x45]);

        let parsed = NetKeyAppKeyIndexesPair::parse(&xmit).unwrap();
        assert_eq!(parsed.net_key(), NetKeyIndex::new(0x123));
        assert_eq!(parsed.app_key(), AppKeyIndex::new(0x456));
    }

    #[test]
    fn single_key_index() {
        let mut xmit: Vec<u8, 2> = Vec::new();
        AppKeyIndex::new(0x0ABC).emit(&mut xmit).unwrap();
        assert_eq!(&xmit[..], &[0xBC, 0x0A]);
        assert_eq!(AppKeyIndex::parse(&xmit).unwrap().value(), 0x0ABC);
    }

    #[test]
    fn client_ignores_foreign_opcodes() {
        let parsed = ConfigurationClient::parse(&Opcode::TwoOctet(0x82, 0x04), &[0x01]).unwrap();
        assert!(parsed.is_none());
    }
}
