//! The narrow contract the driver consumes from the host mesh daemon.
//!
//! Everything cryptographic lives on the other side: the daemon encrypts
//! with device and application keys, runs the provisioning protocol and
//! scans the radio. The driver only issues [`MeshRequest`]s and reacts to
//! the [`MeshEvent`]s that come back, in whatever order they arrive.

use crate::error::MAX_REASON_LEN;
use core::future::Future;
use heapless::{String, Vec};
use zyvega_common::address::UnicastAddress;
use zyvega_common::{ParseError, Uuid};
use zyvega_models::foundation::configuration::{AppKeyIndex, NetKeyIndex};
use zyvega_models::MAX_ACCESS_PAYLOAD;

/// Access payload, opcode included.
pub type AccessPayload = Vec<u8, MAX_ACCESS_PAYLOAD>;

/// Advertised data of an unprovisioned beacon: UUID then OOB information.
pub const MAX_SCAN_DATA: usize = 32;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// No network is attached yet.
    NotAttached,
    /// The requested key or object already exists.
    AlreadyExists,
    /// The daemon cannot be reached.
    Unavailable,
    /// The daemon refused the request.
    Rejected,
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeshRequest {
    CreateNetwork {
        app_uuid: Uuid,
    },
    Attach {
        token: u64,
    },
    Leave {
        token: u64,
    },
    UnprovisionedScan {
        seconds: u16,
    },
    AddNode {
        uuid: Uuid,
    },
    /// Answer to [`MeshEvent::RequestProvData`].
    ProvisionData {
        net_key_index: NetKeyIndex,
        unicast: UnicastAddress,
    },
    DevKeySend {
        destination: UnicastAddress,
        net_key_index: NetKeyIndex,
        payload: AccessPayload,
    },
    CreateAppKey {
        net_key_index: NetKeyIndex,
        app_key_index: AppKeyIndex,
    },
    /// Sends Config AppKey Add, built and encrypted by the daemon.
    AddAppKey {
        destination: UnicastAddress,
        app_key_index: AppKeyIndex,
        net_key_index: NetKeyIndex,
    },
    Send {
        destination: UnicastAddress,
        app_key_index: AppKeyIndex,
        payload: AccessPayload,
    },
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeshEvent {
    JoinComplete {
        token: u64,
    },
    JoinFailed {
        reason: String<MAX_REASON_LEN>,
    },
    Attached,
    AttachFailed,
    ScanResult {
        rssi: i16,
        data: Vec<u8, MAX_SCAN_DATA>,
    },
    /// The daemon asks which address the device being added should get.
    RequestProvData {
        count: u8,
    },
    AddNodeComplete {
        uuid: Uuid,
        unicast: UnicastAddress,
        count: u8,
    },
    AddNodeFailed {
        uuid: Uuid,
        reason: String<MAX_REASON_LEN>,
    },
    DevKeyMessage {
        source: UnicastAddress,
        data: AccessPayload,
    },
    Message {
        source: UnicastAddress,
        data: AccessPayload,
    },
}

/// An unprovisioned device seen during a scan.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanResult {
    pub uuid: Uuid,
    pub rssi: i16,
    pub oob: u16,
}

impl ScanResult {
    /// OOB information is optional and big-endian when present.
    pub fn parse(rssi: i16, data: &[u8]) -> Result<Self, ParseError> {
        let uuid = Uuid::parse(data)?;
        let oob = if data.len() >= 18 {
            u16::from_be_bytes([data[16], data[17]])
        } else {
            0
        };
        Ok(Self { uuid, rssi, oob })
    }
}

pub trait MeshTransport {
    type RequestFuture<'m>: Future<Output = Result<(), TransportError>> + 'm
    where
        Self: 'm;

    type EventFuture<'m>: Future<Output = Result<MeshEvent, TransportError>> + 'm
    where
        Self: 'm;

    /// Issues `request` and returns once the daemon accepted it. Results
    /// arrive later through [`MeshTransport::next_event`].
    fn request<'m>(&'m mut self, request: &'m MeshRequest) -> Self::RequestFuture<'m>;

    fn next_event(&mut self) -> Self::EventFuture<'_>;
}
