use crate::error::{ProvisioningError, MAX_REASON_LEN};
use crate::storage::Node;
use crate::transport::{MeshEvent, MeshRequest, ScanResult};
use heapless::{String, Vec};
use zyvega_common::address::UnicastAddress;
use zyvega_common::Uuid;
use zyvega_models::foundation::configuration::NetKeyIndex;

pub const MAX_SCAN_RESULTS: usize = 16;

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProvisioningState {
    Idle,
    Scanning,
    AwaitingAddressRequest {
        uuid: Uuid,
    },
    /// An address range has been offered but nothing is persisted yet.
    AwaitingComplete {
        uuid: Uuid,
        offered: UnicastAddress,
        count: u8,
    },
    Provisioned {
        node: Node,
    },
    Failed {
        uuid: Uuid,
        reason: String<MAX_REASON_LEN>,
    },
}

impl ProvisioningState {
    /// Whether a new attempt may start from here.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Scanning | Self::Provisioned { .. } | Self::Failed { .. }
        )
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ProvisioningAction {
    /// Hand this to the transport.
    Request(MeshRequest),
    /// The device joined; record it and start configuring it.
    Complete(Node),
}

/// Drives one device at a time through the add-node handshake.
pub struct Provisioner {
    state: ProvisioningState,
    results: Vec<ScanResult, MAX_SCAN_RESULTS>,
    net_key_index: NetKeyIndex,
}

impl Provisioner {
    pub fn new(net_key_index: NetKeyIndex) -> Self {
        Self {
            state: ProvisioningState::Idle,
            results: Vec::new(),
            net_key_index,
        }
    }

    pub fn state(&self) -> &ProvisioningState {
        &self.state
    }

    pub fn results(&self) -> &[ScanResult] {
        &self.results
    }

    /// Drops scan results and any attempt in flight.
    pub fn reset(&mut self) {
        self.state = ProvisioningState::Idle;
        self.results.clear();
    }

    pub fn start_scan(&mut self, seconds: u16) -> Result<MeshRequest, ProvisioningError> {
        if !self.state.is_settled() {
            return Err(ProvisioningError::ProvisioningInProgress);
        }
        self.results.clear();
        self.transition(ProvisioningState::Scanning);
        Ok(MeshRequest::UnprovisionedScan { seconds })
    }

    pub fn provision(&mut self, index: usize) -> Result<MeshRequest, ProvisioningError> {
        if !self.state.is_settled() {
            return Err(ProvisioningError::ProvisioningInProgress);
        }
        let uuid = self
            .results
            .get(index)
            .map(|result| result.uuid)
            .ok_or(ProvisioningError::InvalidIndex)?;
        self.transition(ProvisioningState::AwaitingAddressRequest { uuid });
        Ok(MeshRequest::AddNode { uuid })
    }

    /// Abandons an attempt whose add-node request never reached the
    /// daemon. Scan results are kept.
    pub fn abort(&mut self) {
        if !self.state.is_settled() {
            self.transition(ProvisioningState::Idle);
        }
    }

    /// Feeds one event through the workflow. Events that do not belong to
    /// the current attempt are dropped.
    ///
    /// `next_unicast` is the registry's allocation cursor; it is only read.
    pub fn handle(
        &mut self,
        event: &MeshEvent,
        next_unicast: u16,
    ) -> Result<Option<ProvisioningAction>, ProvisioningError> {
        match (&self.state, event) {
            (_, MeshEvent::ScanResult { rssi, data }) => {
                match ScanResult::parse(*rssi, data) {
                    Ok(result) => self.record(result),
                    Err(_) => {
                        debug!("ignoring short scan result ({} octets)", data.len());
                    }
                }
                Ok(None)
            }
            (ProvisioningState::AwaitingAddressRequest { uuid }, MeshEvent::RequestProvData { count }) => {
                let uuid = *uuid;
                let count = (*count).max(1);
                match Self::allocate(next_unicast, count) {
                    Some(offered) => {
                        info!("offering {} (+{}) to {}", offered, count, uuid);
                        self.transition(ProvisioningState::AwaitingComplete {
                            uuid,
                            offered,
                            count,
                        });
                        Ok(Some(ProvisioningAction::Request(
                            MeshRequest::ProvisionData {
                                net_key_index: self.net_key_index,
                                unicast: offered,
                            },
                        )))
                    }
                    None => {
                        self.fail(uuid, "unicast address space exhausted");
                        Err(ProvisioningError::AddressSpaceExhausted)
                    }
                }
            }
            (
                ProvisioningState::AwaitingComplete {
                    uuid: expected,
                    offered,
                    ..
                },
                MeshEvent::AddNodeComplete {
                    uuid,
                    unicast,
                    count,
                },
            ) if expected == uuid => {
                if offered != unicast {
                    warn!("{} joined at {} instead of {}", uuid, unicast, offered);
                }
                let node = Node::new(*uuid, *unicast, (*count).max(1));
                self.transition(ProvisioningState::Provisioned { node });
                Ok(Some(ProvisioningAction::Complete(node)))
            }
            (
                ProvisioningState::AwaitingAddressRequest { uuid: expected }
                | ProvisioningState::AwaitingComplete {
                    uuid: expected, ..
                },
                MeshEvent::AddNodeFailed { uuid, reason },
            ) if expected == uuid => {
                let uuid = *uuid;
                let reason = reason.clone();
                self.transition(ProvisioningState::Failed {
                    uuid,
                    reason: reason.clone(),
                });
                Err(ProvisioningError::Failed(reason))
            }
            (
                _,
                MeshEvent::RequestProvData { .. }
                | MeshEvent::AddNodeComplete { .. }
                | MeshEvent::AddNodeFailed { .. },
            ) => {
                debug!("ignoring stray provisioning event");
                Ok(None)
            }
            (_, _) => Ok(None),
        }
    }

    fn record(&mut self, result: ScanResult) {
        if let Some(existing) = self
            .results
            .iter_mut()
            .find(|existing| existing.uuid == result.uuid)
        {
            existing.rssi = result.rssi;
            existing.oob = result.oob;
        } else if self.results.push(result).is_ok() {
            info!("unprovisioned device {} rssi={}", result.uuid, result.rssi);
        } else {
            warn!("scan result table full, dropping {}", result.uuid);
        }
    }

    /// First address of a `count` element range starting at the cursor, if
    /// the whole range is unicast.
    fn allocate(next_unicast: u16, count: u8) -> Option<UnicastAddress> {
        let first = UnicastAddress::new(next_unicast).ok()?;
        first.checked_add(count as u16 - 1)?;
        Some(first)
    }

    fn fail(&mut self, uuid: Uuid, reason: &str) {
        let mut text = String::new();
        let _ = text.push_str(reason);
        self.transition(ProvisioningState::Failed { uuid, reason: text });
    }

    fn transition(&mut self, state: ProvisioningState) {
        info!("provisioning {:?} -> {:?}", self.state, state);
        self.state = state;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn uuid(n: u8) -> Uuid {
        Uuid::new([n; 16])
    }

    fn scan(n: u8, rssi: i16) -> MeshEvent {
        MeshEvent::ScanResult {
            rssi,
            data: Vec::from_slice(&[n; 18]).unwrap(),
        }
    }

    fn reason(text: &str) -> String<MAX_REASON_LEN> {
        let mut reason = String::new();
        reason.push_str(text).unwrap();
        reason
    }

    fn scanned() -> Provisioner {
        let mut provisioner = Provisioner::new(NetKeyIndex::new(0));
        provisioner.start_scan(10).unwrap();
        provisioner.handle(&scan(1, -70), 2).unwrap();
        provisioner.handle(&scan(2, -50), 2).unwrap();
        provisioner
    }

    #[test]
    fn scan_results_deduplicated_by_uuid() {
        let mut provisioner = scanned();
        provisioner.handle(&scan(1, -40), 2).unwrap();
        assert_eq!(provisioner.results().len(), 2);
        assert_eq!(provisioner.results()[0].rssi, -40);

        // a new scan starts from nothing
        assert_eq!(
            provisioner.start_scan(5).unwrap(),
            MeshRequest::UnprovisionedScan { seconds: 5 }
        );
        assert!(provisioner.results().is_empty());
    }

    #[test]
    fn invalid_index() {
        let mut provisioner = scanned();
        assert_eq!(
            provisioner.provision(2),
            Err(ProvisioningError::InvalidIndex)
        );
        assert_eq!(provisioner.state(), &ProvisioningState::Scanning);
    }

    #[test]
    fn full_handshake() {
        let mut provisioner = scanned();
        assert_eq!(
            provisioner.provision(1).unwrap(),
            MeshRequest::AddNode { uuid: uuid(2) }
        );

        let action = provisioner
            .handle(&MeshEvent::RequestProvData { count: 2 }, 0x0005)
            .unwrap();
        let offered = UnicastAddress::new(0x0005).unwrap();
        assert_eq!(
            action,
            Some(ProvisioningAction::Request(MeshRequest::ProvisionData {
                net_key_index: NetKeyIndex::new(0),
                unicast: offered,
            }))
        );

        let action = provisioner
            .handle(
                &MeshEvent::AddNodeComplete {
                    uuid: uuid(2),
                    unicast: offered,
                    count: 2,
                },
                0x0005,
            )
            .unwrap();
        let node = Node::new(uuid(2), offered, 2);
        assert_eq!(action, Some(ProvisioningAction::Complete(node)));
        assert_eq!(provisioner.state(), &ProvisioningState::Provisioned { node });
    }

    #[test]
    fn zero_element_completion_counts_as_one() {
        let mut provisioner = scanned();
        provisioner.provision(0).unwrap();
        provisioner
            .handle(&MeshEvent::RequestProvData { count: 1 }, 2)
            .unwrap();
        let unicast = UnicastAddress::new(0x0002).unwrap();
        let action = provisioner
            .handle(
                &MeshEvent::AddNodeComplete {
                    uuid: uuid(1),
                    unicast,
                    count: 0,
                },
                2,
            )
            .unwrap();
        match action {
            Some(ProvisioningAction::Complete(node)) => {
                assert_eq!(node.element_count, 1);
                assert_eq!(node.range_end(), 0x0003);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn second_attempt_while_in_flight() {
        let mut provisioner = scanned();
        provisioner.provision(0).unwrap();
        assert_eq!(
            provisioner.provision(1),
            Err(ProvisioningError::ProvisioningInProgress)
        );
        assert_eq!(
            provisioner.start_scan(10),
            Err(ProvisioningError::ProvisioningInProgress)
        );
    }

    #[test]
    fn failure_reported_verbatim() {
        let mut provisioner = scanned();
        provisioner.provision(0).unwrap();
        provisioner
            .handle(&MeshEvent::RequestProvData { count: 1 }, 2)
            .unwrap();

        let result = provisioner.handle(
            &MeshEvent::AddNodeFailed {
                uuid: uuid(1),
                reason: reason("cannot-connect"),
            },
            2,
        );
        assert_eq!(
            result,
            Err(ProvisioningError::Failed(reason("cannot-connect")))
        );
        assert!(provisioner.state().is_settled());

        // a fresh attempt is allowed after failure
        assert!(provisioner.provision(0).is_ok());
    }

    #[test]
    fn stray_events_ignored() {
        let mut provisioner = scanned();
        assert_eq!(
            provisioner.handle(&MeshEvent::RequestProvData { count: 1 }, 2),
            Ok(None)
        );

        provisioner.provision(0).unwrap();
        provisioner
            .handle(&MeshEvent::RequestProvData { count: 1 }, 2)
            .unwrap();
        let other = MeshEvent::AddNodeComplete {
            uuid: uuid(9),
            unicast: UnicastAddress::new(2).unwrap(),
            count: 1,
        };
        assert_eq!(provisioner.handle(&other, 2), Ok(None));
        assert!(matches!(
            provisioner.state(),
            ProvisioningState::AwaitingComplete { .. }
        ));
    }

    #[test]
    fn address_space_exhausted() {
        let mut provisioner = scanned();
        provisioner.provision(0).unwrap();
        assert_eq!(
            provisioner.handle(&MeshEvent::RequestProvData { count: 2 }, 0x7FFF),
            Err(ProvisioningError::AddressSpaceExhausted)
        );
        assert!(matches!(
            provisioner.state(),
            ProvisioningState::Failed { .. }
        ));
    }

    #[test]
    fn last_address_can_still_be_offered() {
        let mut provisioner = scanned();
        provisioner.provision(0).unwrap();
        let action = provisioner
            .handle(&MeshEvent::RequestProvData { count: 1 }, 0x7FFF)
            .unwrap();
        assert!(matches!(
            action,
            Some(ProvisioningAction::Request(MeshRequest::ProvisionData { .. }))
        ));
    }
}
