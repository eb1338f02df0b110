use crate::storage::StorageError;
use crate::transport::TransportError;
use core::fmt::{Display, Formatter};
use heapless::String;
use zyvega_common::address::InvalidAddress;
use zyvega_common::{InsufficientBuffer, ParseError};
use zyvega_models::foundation::configuration::composition_data::CompositionError;
use zyvega_zybl::FrameError;

/// Longest failure reason kept from the mesh daemon.
pub const MAX_REASON_LEN: usize = 64;

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProvisioningError {
    InvalidIndex,
    ProvisioningInProgress,
    /// The daemon's reason, verbatim up to [`MAX_REASON_LEN`] octets.
    Failed(String<MAX_REASON_LEN>),
    AddressSpaceExhausted,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationError {
    CompositionTooShort,
    ElementTruncated,
    NoVendorModel,
    AppKeyDistributionFailed(u8),
    ModelBindFailed(u8),
}

impl From<CompositionError> for ConfigurationError {
    fn from(err: CompositionError) -> Self {
        match err {
            CompositionError::TooShort => Self::CompositionTooShort,
            CompositionError::ElementTruncated => Self::ElementTruncated,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError {
    InvalidState,
    InsufficientSpace,
    UnknownNode,
    NodeNotConfigured,
    InvalidValue,
    Parse(ParseError),
    Frame(FrameError),
    Provisioning(ProvisioningError),
    Configuration(ConfigurationError),
    Transport(TransportError),
    Storage(StorageError),
}

impl From<ProvisioningError> for DriverError {
    fn from(err: ProvisioningError) -> Self {
        Self::Provisioning(err)
    }
}

impl From<ConfigurationError> for DriverError {
    fn from(err: ConfigurationError) -> Self {
        Self::Configuration(err)
    }
}

impl From<CompositionError> for DriverError {
    fn from(err: CompositionError) -> Self {
        Self::Configuration(err.into())
    }
}

impl From<TransportError> for DriverError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

impl From<StorageError> for DriverError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<FrameError> for DriverError {
    fn from(err: FrameError) -> Self {
        Self::Frame(err)
    }
}

impl From<ParseError> for DriverError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl From<InvalidAddress> for DriverError {
    fn from(_: InvalidAddress) -> Self {
        Self::Parse(ParseError::InvalidValue)
    }
}

impl From<InsufficientBuffer> for DriverError {
    fn from(_: InsufficientBuffer) -> Self {
        Self::InsufficientSpace
    }
}

impl Display for DriverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            DriverError::Provisioning(ProvisioningError::Failed(reason)) => {
                write!(f, "provisioning failed: {}", reason)
            }
            DriverError::Configuration(ConfigurationError::AppKeyDistributionFailed(status)) => {
                write!(f, "app key distribution failed (status {:#04x})", status)
            }
            DriverError::Configuration(ConfigurationError::ModelBindFailed(status)) => {
                write!(f, "model bind failed (status {:#04x})", status)
            }
            DriverError::Frame(err) => write!(f, "frame: {}", err),
            other => write!(f, "{:?}", other),
        }
    }
}
