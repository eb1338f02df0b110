use crate::ParseError;
use core::fmt::{Display, Formatter};

/// Indicates an invalid address.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidAddress;

impl Display for InvalidAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str("not a unicast address")
    }
}

impl From<InvalidAddress> for ParseError {
    fn from(_: InvalidAddress) -> Self {
        ParseError::InvalidValue
    }
}

/// Address of a single element, in the range `0x0001..=0x7FFF`.
#[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Debug, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u16", into = "u16"))]
pub struct UnicastAddress(u16);

impl UnicastAddress {
    /// The address held by the local provisioner node.
    pub const PROVISIONER: UnicastAddress = UnicastAddress(0x0001);
    pub const MAX: UnicastAddress = UnicastAddress(0x7FFF);

    pub fn new(addr: u16) -> Result<Self, InvalidAddress> {
        if Self::is_unicast_address(addr) {
            Ok(Self(addr))
        } else {
            Err(InvalidAddress)
        }
    }

    pub fn is_unicast_address(addr: u16) -> bool {
        addr != 0 && addr & 0x8000 == 0
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    pub fn to_le_bytes(&self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    pub fn parse_le(data: [u8; 2]) -> Result<Self, InvalidAddress> {
        Self::new(u16::from_le_bytes(data))
    }

    /// Address `count` elements past this one, if still unicast.
    pub fn checked_add(&self, count: u16) -> Option<Self> {
        self.0
            .checked_add(count)
            .and_then(|addr| Self::new(addr).ok())
    }

    /// Address just past a range of `count` elements starting here. May equal
    /// `0x8000` for a range ending on the last unicast address.
    pub fn range_end(&self, count: u8) -> u16 {
        self.0.saturating_add(count as u16)
    }
}

impl TryFrom<u16> for UnicastAddress {
    type Error = InvalidAddress;

    fn try_from(addr: u16) -> Result<Self, Self::Error> {
        Self::new(addr)
    }
}

impl From<UnicastAddress> for u16 {
    fn from(addr: UnicastAddress) -> Self {
        addr.0
    }
}

impl Default for UnicastAddress {
    fn default() -> Self {
        Self::PROVISIONER
    }
}

impl core::fmt::LowerHex for UnicastAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        core::fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Display for UnicastAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for UnicastAddress {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{=u16:04x}", self.0);
    }
}
