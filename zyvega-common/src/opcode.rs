use crate::{CompanyIdentifier, InsufficientBuffer};
use core::fmt::{Display, Formatter};
use heapless::Vec;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Opcode {
    OneOctet(u8),
    TwoOctet(u8, u8),
    ThreeOctet(u8, u8, u8),
}

impl Opcode {
    /// Vendor opcode: six low bits of `opcode` tagged `0b11`, followed by
    /// the little-endian company identifier.
    pub const fn vendor(opcode: u8, company: CompanyIdentifier) -> Self {
        let cid = company.0.to_le_bytes();
        Opcode::ThreeOctet(0xC0 | (opcode & 0x3F), cid[0], cid[1])
    }

    pub fn is_vendor(&self) -> bool {
        matches!(self, Opcode::ThreeOctet(..))
    }

    /// Company identifier of a vendor opcode.
    pub fn company(&self) -> Option<CompanyIdentifier> {
        match self {
            Opcode::ThreeOctet(_, lo, hi) => {
                Some(CompanyIdentifier(u16::from_le_bytes([*lo, *hi])))
            }
            _ => None,
        }
    }

    pub fn opcode_len(&self) -> usize {
        match self {
            Opcode::OneOctet(_) => 1,
            Opcode::TwoOctet(_, _) => 2,
            Opcode::ThreeOctet(_, _, _) => 3,
        }
    }

    pub fn split(data: &[u8]) -> Option<(Opcode, &[u8])> {
        if data.is_empty() {
            None
        } else if data[0] & 0b10000000 == 0 {
            if data[0] == 0b01111111 {
                // reserved for future use
                None
            } else {
                Some((Opcode::OneOctet(data[0]), &data[1..]))
            }
        } else if data.len() >= 2 && data[0] & 0b11000000 == 0b10000000 {
            Some((Opcode::TwoOctet(data[0], data[1]), &data[2..]))
        } else if data.len() >= 3 && data[0] & 0b11000000 == 0b11000000 {
            Some((Opcode::ThreeOctet(data[0], data[1], data[2]), &data[3..]))
        } else {
            None
        }
    }

    pub fn emit<const N: usize>(&self, xmit: &mut Vec<u8, N>) -> Result<(), InsufficientBuffer> {
        match self {
            Opcode::OneOctet(a) => {
                xmit.push(*a).map_err(|_| InsufficientBuffer)?;
            }
            Opcode::TwoOctet(a, b) => {
                xmit.extend_from_slice(&[*a, *b])?;
            }
            Opcode::ThreeOctet(a, b, c) => {
                xmit.extend_from_slice(&[*a, *b, *c])?;
            }
        }
        Ok(())
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Opcode::OneOctet(a) => write!(f, "{:02x}", a),
            Opcode::TwoOctet(a, b) => write!(f, "{:02x}{:02x}", a, b),
            Opcode::ThreeOctet(a, b, c) => write!(f, "{:02x}{:02x}{:02x}", a, b, c),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Opcode {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Opcode::OneOctet(a) => defmt::write!(fmt, "{=u8:02x}", a),
            Opcode::TwoOctet(a, b) => defmt::write!(fmt, "{=u8:02x}{=u8:02x}", a, b),
            Opcode::ThreeOctet(a, b, c) => {
                defmt::write!(fmt, "{=u8:02x}{=u8:02x}{=u8:02x}", a, b, c)
            }
        }
    }
}

#[macro_export]
macro_rules! opcode {
    ($name:ident $o1:expr) => {
        pub const $name: $crate::opcode::Opcode = $crate::opcode::Opcode::OneOctet($o1);
    };

    ($name:ident $o1:expr, $o2:expr) => {
        pub const $name: $crate::opcode::Opcode = $crate::opcode::Opcode::TwoOctet($o1, $o2);
    };

    ($name:ident $o1:expr, $o2:expr, $o3:expr) => {
        pub const $name: $crate::opcode::Opcode = $crate::opcode::Opcode::ThreeOctet($o1, $o2, $o3);
    };
}
