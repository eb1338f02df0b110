use crate::foundation::configuration::ConfigurationMessage;
use crate::{Message, MAX_ACCESS_PAYLOAD};
use heapless::Vec;
use zyvega_common::opcode::Opcode;
use zyvega_common::{
    opcode, CompanyIdentifier, Features, InsufficientBuffer, ModelIdentifier, ParseError,
    ProductIdentifier, VersionIdentifier,
};

opcode!( CONFIG_COMPOSITION_DATA_GET 0x80, 0x08 );
opcode!( CONFIG_COMPOSITION_DATA_STATUS 0x02 );

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub enum CompositionDataMessage {
    Get(u8),
    Status(CompositionStatus),
}

impl From<CompositionDataMessage> for ConfigurationMessage {
    fn from(inner: CompositionDataMessage) -> Self {
        ConfigurationMessage::CompositionData(inner)
    }
}

impl CompositionDataMessage {
    pub fn parse_status(parameters: &[u8]) -> Result<Self, ParseError> {
        Ok(Self::Status(CompositionStatus::new(parameters)?))
    }
}

impl Message for CompositionDataMessage {
    fn opcode(&self) -> Opcode {
        match self {
            Self::Get(_) => CONFIG_COMPOSITION_DATA_GET,
            Self::Status(_) => CONFIG_COMPOSITION_DATA_STATUS,
        }
    }

    fn emit_parameters<const N: usize>(
        &self,
        xmit: &mut Vec<u8, N>,
    ) -> Result<(), InsufficientBuffer> {
        match self {
            CompositionDataMessage::Get(page) => {
                xmit.push(*page).map_err(|_| InsufficientBuffer)?
            }
            CompositionDataMessage::Status(inner) => {
                xmit.extend_from_slice(&inner.parameters)?
            }
        }
        Ok(())
    }
}

/// Composition Data Status as received, page octet included. Interpreting
/// the contents is left to [`Composition::parse`], so that a malformed
/// page still reaches the caller.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub struct CompositionStatus {
    parameters: Vec<u8, MAX_ACCESS_PAYLOAD>,
}

impl CompositionStatus {
    pub fn new(parameters: &[u8]) -> Result<Self, ParseError> {
        Ok(Self {
            parameters: Vec::from_slice(parameters)?,
        })
    }

    pub fn parameters(&self) -> &[u8] {
        &self.parameters
    }

    pub fn composition(&self) -> Result<Composition<'_>, CompositionError> {
        Composition::parse(&self.parameters)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompositionError {
    /// Fewer octets than the page number and fixed header.
    TooShort,
    /// An element's model counts run past the end of the data.
    ElementTruncated,
}

const HEADER_LEN: usize = 11;
/// Location and the two model counts. A shorter tail is padding.
const ELEMENT_HEADER_LEN: usize = 4;

/// Composition data page 0, validated and borrowed from the status
/// parameters.
#[derive(Copy, Clone, Debug)]
pub struct Composition<'a> {
    page: u8,
    cid: CompanyIdentifier,
    pid: ProductIdentifier,
    vid: VersionIdentifier,
    crpl: u16,
    features: Features,
    elements: &'a [u8],
}

impl<'a> Composition<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, CompositionError> {
        if data.len() < HEADER_LEN {
            return Err(CompositionError::TooShort);
        }
        let u16_at = |offset: usize| u16::from_le_bytes([data[offset], data[offset + 1]]);

        let elements = &data[HEADER_LEN..];
        let mut remaining = elements;
        while remaining.len() >= ELEMENT_HEADER_LEN {
            let (_, rest) = Element::split(remaining)?;
            remaining = rest;
        }

        Ok(Self {
            page: data[0],
            cid: CompanyIdentifier(u16_at(1)),
            pid: ProductIdentifier(u16_at(3)),
            vid: VersionIdentifier(u16_at(5)),
            crpl: u16_at(7),
            features: Features(u16_at(9)),
            elements,
        })
    }

    pub fn page(&self) -> u8 {
        self.page
    }

    pub fn cid(&self) -> CompanyIdentifier {
        self.cid
    }

    pub fn pid(&self) -> ProductIdentifier {
        self.pid
    }

    pub fn vid(&self) -> VersionIdentifier {
        self.vid
    }

    pub fn crpl(&self) -> u16 {
        self.crpl
    }

    pub fn features(&self) -> Features {
        self.features
    }

    pub fn elements(&self) -> Elements<'a> {
        Elements {
            remaining: self.elements,
        }
    }

    /// First vendor model across all elements, in element order.
    pub fn first_vendor_model(&self) -> Option<(CompanyIdentifier, u16)> {
        self.elements()
            .flat_map(|element| element.vendor_models())
            .find_map(|model| match model {
                ModelIdentifier::Vendor(company, model_id) => Some((company, model_id)),
                ModelIdentifier::SIG(_) => None,
            })
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Element<'a> {
    loc: u16,
    sig_models: &'a [u8],
    vendor_models: &'a [u8],
}

impl<'a> Element<'a> {
    fn split(data: &'a [u8]) -> Result<(Self, &'a [u8]), CompositionError> {
        if data.len() < ELEMENT_HEADER_LEN {
            return Err(CompositionError::ElementTruncated);
        }
        let loc = u16::from_le_bytes([data[0], data[1]]);
        let sig_len = data[2] as usize * 2;
        let vendor_len = data[3] as usize * 4;
        let body = &data[4..];
        if body.len() < sig_len + vendor_len {
            return Err(CompositionError::ElementTruncated);
        }
        Ok((
            Self {
                loc,
                sig_models: &body[..sig_len],
                vendor_models: &body[sig_len..sig_len + vendor_len],
            },
            &body[sig_len + vendor_len..],
        ))
    }

    pub fn loc(&self) -> u16 {
        self.loc
    }

    pub fn sig_models(&self) -> impl Iterator<Item = ModelIdentifier> + 'a {
        self.sig_models
            .chunks_exact(2)
            .map(|chunk| ModelIdentifier::SIG(u16::from_le_bytes([chunk[0], chunk[1]])))
    }

    pub fn vendor_models(&self) -> impl Iterator<Item = ModelIdentifier> + 'a {
        self.vendor_models.chunks_exact(4).map(|chunk| {
            ModelIdentifier::Vendor(
                CompanyIdentifier(u16::from_le_bytes([chunk[0], chunk[1]])),
                u16::from_le_bytes([chunk[2], chunk[3]]),
            )
        })
    }
}

pub struct Elements<'a> {
    remaining: &'a [u8],
}

impl<'a> Iterator for Elements<'a> {
    type Item = Element<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.len() < ELEMENT_HEADER_LEN {
            return None;
        }
        // validated in `Composition::parse`
        let (element, rest) = Element::split(self.remaining).ok()?;
        self.remaining = rest;
        Some(element)
    }
}
