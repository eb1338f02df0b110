//! Provisioner-side driver for Zhiyun Vega lights on a Bluetooth Mesh
//! network, plus direct control over GATT.
//!
//! The mesh daemon does the cryptography; [`Driver`] decides what to ask
//! of it. Every answer comes back as a [`MeshEvent`], handed to
//! [`Driver::process`] (or pulled by [`Driver::run`]), which advances the
//! provisioning workflow and the per-node configuration machines and
//! persists each completed step before moving on.
#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod fmt;

mod config;
pub mod configuration;
pub mod control;
mod error;
pub mod gatt;
pub mod provisioner;
pub mod storage;
pub mod transport;

use crate::configuration::{ConfigurationStage, Effect, Effects, NodeConfiguration};
use crate::control::TransactionIds;
use crate::provisioner::{Provisioner, ProvisioningAction, ProvisioningState};
use crate::storage::{BackingStore, Configuration, Node, Storage, MAX_NODES};
use crate::transport::{AccessPayload, MeshRequest, MeshTransport, ScanResult};
use heapless::{FnvIndexMap, Vec};
use rand_core::RngCore;
use zyvega_common::address::UnicastAddress;
use zyvega_common::opcode::Opcode;
use zyvega_common::Uuid;
use zyvega_models::foundation::configuration::node_reset::NodeResetMessage;
use zyvega_models::foundation::configuration::{ConfigurationClient, ConfigurationMessage};
use zyvega_models::generic::level::{GenericLevelClient, GenericLevelMessage, GenericLevelSet};
use zyvega_models::generic::onoff::{self, GenericOnOffClient, GenericOnOffMessage};
use zyvega_models::vendor::{
    VendorMessage, ZhiyunCommand, ZhiyunMessage, KELVIN_MAX, KELVIN_MIN,
};
use zyvega_models::{Message, Model};

pub use config::DriverConfig;
pub use error::{ConfigurationError, DriverError, ProvisioningError};
pub use transport::{MeshEvent, TransportError};

pub struct Driver<T: MeshTransport, B: BackingStore, R: RngCore> {
    transport: T,
    storage: Storage<B>,
    rng: R,
    config: DriverConfig,
    attached: bool,
    provisioner: Provisioner,
    configurations: FnvIndexMap<u16, NodeConfiguration, MAX_NODES>,
    transactions: TransactionIds<MAX_NODES>,
}

impl<T: MeshTransport, B: BackingStore, R: RngCore> Driver<T, B, R> {
    pub fn new(transport: T, backing_store: B, rng: R, config: DriverConfig) -> Self {
        Self {
            transport,
            storage: Storage::new(backing_store, config.first_unicast),
            rng,
            config,
            attached: false,
            provisioner: Provisioner::new(config.net_key_index),
            configurations: FnvIndexMap::new(),
            transactions: TransactionIds::default(),
        }
    }

    /// Attaches to the stored network, or asks the daemon for a new one.
    pub async fn initialize(&mut self) -> Result<(), DriverError> {
        match self.storage.get().await?.network().token {
            Some(token) => {
                info!("attaching to network {:016x}", token);
                self.send(&MeshRequest::Attach { token }).await
            }
            None => self.create_network().await,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub async fn registry(&self) -> Result<Configuration, DriverError> {
        Ok(self.storage.get().await?)
    }

    pub async fn nodes(&self) -> Result<Vec<Node, MAX_NODES>, DriverError> {
        let config = self.storage.get().await?;
        Vec::from_slice(config.nodes()).map_err(|_| DriverError::InsufficientSpace)
    }

    /// The node commands go to when none is named: the first one stored.
    pub async fn default_target(&self) -> Result<UnicastAddress, DriverError> {
        self.storage
            .get()
            .await?
            .nodes()
            .first()
            .map(|node| node.unicast)
            .ok_or(DriverError::UnknownNode)
    }

    pub fn scan_results(&self) -> &[ScanResult] {
        self.provisioner.results()
    }

    pub fn provisioning_state(&self) -> &ProvisioningState {
        self.provisioner.state()
    }

    pub fn configuration_stage(&self, unicast: UnicastAddress) -> Option<ConfigurationStage> {
        self.configurations
            .get(&unicast.value())
            .map(NodeConfiguration::stage)
    }

    pub fn configuration_error(&self, unicast: UnicastAddress) -> Option<ConfigurationError> {
        self.configurations
            .get(&unicast.value())
            .and_then(NodeConfiguration::halted)
    }

    /// Scans for the configured number of seconds.
    pub async fn scan(&mut self) -> Result<(), DriverError> {
        self.start_scan(self.config.scan_seconds).await
    }

    pub async fn start_scan(&mut self, seconds: u16) -> Result<(), DriverError> {
        self.require_attached()?;
        let request = self.provisioner.start_scan(seconds)?;
        info!("scanning for unprovisioned devices ({}s)", seconds);
        self.send(&request).await
    }

    /// Starts adding the device at `index` of [`Driver::scan_results`].
    pub async fn provision(&mut self, index: usize) -> Result<(), DriverError> {
        self.require_attached()?;
        let request = self.provisioner.provision(index)?;
        if let Err(err) = self.send(&request).await {
            self.provisioner.abort();
            return Err(err);
        }
        Ok(())
    }

    /// Resumes configuration of a node from its last persisted step.
    pub async fn configure(&mut self, unicast: UnicastAddress) -> Result<(), DriverError> {
        self.require_attached()?;
        let node = self.node(unicast).await?;
        self.start_configuration(&node).await
    }

    /// Resets the node and forgets it. Its addresses are not reused.
    pub async fn remove_node(&mut self, unicast: UnicastAddress) -> Result<(), DriverError> {
        self.require_attached()?;
        let mut config = self.storage.get().await?;
        if config.node(unicast).is_none() {
            return Err(DriverError::UnknownNode);
        }

        let mut payload = AccessPayload::new();
        ConfigurationMessage::from(NodeResetMessage::Reset).emit(&mut payload)?;
        self.send(&MeshRequest::DevKeySend {
            destination: unicast,
            net_key_index: self.config.net_key_index,
            payload,
        })
        .await?;

        config.remove_node(unicast);
        self.storage.put(&config).await?;
        self.configurations.remove(&unicast.value());
        self.transactions.forget(unicast);
        info!("removed node {}", unicast);
        Ok(())
    }

    /// Leaves the network and forgets everything about it. Responses still
    /// in flight are ignored when they arrive.
    pub async fn reset_network(&mut self) -> Result<(), DriverError> {
        if let Some(token) = self.storage.get().await?.network().token {
            if let Err(err) = self.send(&MeshRequest::Leave { token }).await {
                warn!("leaving network failed: {:?}", err);
            }
        }
        self.storage.clear().await?;
        self.provisioner.reset();
        self.configurations.clear();
        self.transactions.clear();
        self.attached = false;
        info!("network reset");
        Ok(())
    }

    pub async fn set_power(&mut self, unicast: UnicastAddress, on: bool) -> Result<(), DriverError> {
        self.require_attached()?;
        self.node(unicast).await?;
        let tid = self.transactions.next(unicast);
        let message = GenericOnOffMessage::SetUnacknowledged(onoff::Set::new(on, tid));
        self.send_access(unicast, &message).await
    }

    /// `percent` of the Generic Level range.
    pub async fn set_brightness(
        &mut self,
        unicast: UnicastAddress,
        percent: u8,
    ) -> Result<(), DriverError> {
        if percent > 100 {
            return Err(DriverError::InvalidValue);
        }
        self.require_attached()?;
        self.node(unicast).await?;
        let tid = self.transactions.next(unicast);
        let message = GenericLevelMessage::Set(GenericLevelSet::from_percent(percent, tid));
        self.send_access(unicast, &message).await
    }

    pub async fn set_color_temperature(
        &mut self,
        unicast: UnicastAddress,
        kelvin: u16,
    ) -> Result<(), DriverError> {
        if !(KELVIN_MIN..=KELVIN_MAX).contains(&kelvin) {
            return Err(DriverError::InvalidValue);
        }
        self.send_vendor(unicast, ZhiyunCommand::ColorTemperature { kelvin })
            .await
    }

    pub async fn set_rgb(
        &mut self,
        unicast: UnicastAddress,
        percent: u8,
        r: u8,
        g: u8,
        b: u8,
    ) -> Result<(), DriverError> {
        if percent > 100 {
            return Err(DriverError::InvalidValue);
        }
        self.send_vendor(unicast, ZhiyunCommand::rgb(percent, r, g, b))
            .await
    }

    /// Handles one event from the mesh daemon.
    pub async fn process(&mut self, event: MeshEvent) -> Result<(), DriverError> {
        match event {
            MeshEvent::JoinComplete { token } => {
                info!("network created, token {:016x}", token);
                let mut config = self.storage.get().await?;
                config.set_token(Some(token));
                self.storage.put(&config).await?;
                self.send(&MeshRequest::Attach { token }).await
            }
            MeshEvent::JoinFailed { reason } => {
                error!("network creation failed: {}", reason.as_str());
                Err(TransportError::Rejected.into())
            }
            MeshEvent::Attached => {
                info!("attached");
                self.attached = true;
                Ok(())
            }
            MeshEvent::AttachFailed => {
                warn!("attach failed, creating a new network");
                self.attached = false;
                let mut config = self.storage.get().await?;
                config.set_token(None);
                self.storage.put(&config).await?;
                self.create_network().await
            }
            MeshEvent::ScanResult { .. }
            | MeshEvent::RequestProvData { .. }
            | MeshEvent::AddNodeComplete { .. }
            | MeshEvent::AddNodeFailed { .. } => {
                let next_unicast = self.storage.get().await?.network().next_unicast;
                match self.provisioner.handle(&event, next_unicast)? {
                    Some(ProvisioningAction::Request(request)) => self.send(&request).await,
                    Some(ProvisioningAction::Complete(node)) => self.node_provisioned(node).await,
                    None => Ok(()),
                }
            }
            MeshEvent::DevKeyMessage { source, data } => {
                self.dev_key_message(source, &data).await
            }
            MeshEvent::Message { source, data } => {
                self.app_key_message(source, &data);
                Ok(())
            }
        }
    }

    /// Pulls events until the transport fails. Failures of individual
    /// steps are logged and do not stop the loop.
    pub async fn run(&mut self) -> Result<(), DriverError> {
        loop {
            let event = self.transport.next_event().await?;
            match self.process(event).await {
                Ok(()) => {}
                Err(err @ DriverError::Storage(_)) => return Err(err),
                Err(err) => warn!("{:?}", err),
            }
        }
    }

    async fn create_network(&mut self) -> Result<(), DriverError> {
        let mut app_uuid = [0; 16];
        self.rng.fill_bytes(&mut app_uuid);
        let app_uuid = Uuid::new(app_uuid);
        info!("creating network {}", app_uuid);
        self.send(&MeshRequest::CreateNetwork { app_uuid }).await
    }

    async fn node_provisioned(&mut self, node: Node) -> Result<(), DriverError> {
        let mut config = self.storage.get().await?;
        config.add_node(node)?;
        self.storage.put(&config).await?;
        info!(
            "provisioned {} at {} ({} elements)",
            node.uuid, node.unicast, node.element_count
        );
        self.start_configuration(&node).await
    }

    async fn start_configuration(&mut self, node: &Node) -> Result<(), DriverError> {
        let (machine, effects) = NodeConfiguration::start(
            node,
            self.config.net_key_index,
            self.config.app_key_index,
        )?;
        self.configurations
            .insert(node.unicast.value(), machine)
            .map_err(|_| DriverError::InsufficientSpace)?;
        self.apply(node.unicast, effects).await
    }

    async fn dev_key_message(
        &mut self,
        source: UnicastAddress,
        data: &[u8],
    ) -> Result<(), DriverError> {
        let (opcode, parameters) = Opcode::split(data).ok_or(DriverError::Parse(
            zyvega_common::ParseError::InvalidPDUFormat,
        ))?;
        let message = match ConfigurationClient::parse(&opcode, parameters)? {
            Some(message) => message,
            None => {
                debug!("{} sent unhandled configuration opcode {}", source, opcode);
                return Ok(());
            }
        };

        if let ConfigurationMessage::NodeReset(NodeResetMessage::Status) = message {
            info!("{} acknowledged reset", source);
            return Ok(());
        }

        let effects = match self.configurations.get_mut(&source.value()) {
            Some(machine) => machine.handle(&message)?,
            None => {
                debug!("no configuration in progress for {}, ignoring", source);
                return Ok(());
            }
        };
        self.apply(source, effects).await
    }

    fn app_key_message(&self, source: UnicastAddress, data: &[u8]) {
        let (opcode, parameters) = match Opcode::split(data) {
            Some(split) => split,
            None => {
                debug!("{} sent an empty message", source);
                return;
            }
        };

        if opcode.is_vendor() {
            match VendorMessage::parse(data) {
                Ok(vendor) if vendor.company != self.config.company_id => debug!(
                    "{} sent a message for company {:x}, ignoring",
                    source, vendor.company.0
                ),
                Ok(vendor) => info!(
                    "{} vendor opcode {:x} company {:x} params {:?}",
                    source, vendor.opcode, vendor.company.0, vendor.parameters
                ),
                Err(_) => debug!("{} sent a malformed vendor message", source),
            }
        } else if let Ok(Some(GenericOnOffMessage::Status(status))) =
            GenericOnOffClient::parse(&opcode, parameters)
        {
            info!("{} is {}", source, if status.is_on() { "on" } else { "off" });
        } else if let Ok(Some(GenericLevelMessage::Status(status))) =
            GenericLevelClient::parse(&opcode, parameters)
        {
            info!("{} level {}%", source, status.percent());
        } else {
            debug!("{} sent unhandled opcode {}", source, opcode);
        }
    }

    async fn apply(&mut self, unicast: UnicastAddress, effects: Effects) -> Result<(), DriverError> {
        for effect in effects {
            match effect {
                Effect::Request(request) => self.send(&request).await?,
                Effect::StoreVendorModel {
                    company_id,
                    model_id,
                } => {
                    self.update_node(unicast, |node| {
                        node.company_id = Some(company_id);
                        node.vendor_model_id = Some(model_id);
                    })
                    .await?
                }
                Effect::MarkConfigured => {
                    self.update_node(unicast, |node| node.configured = true)
                        .await?;
                    info!("{} configured", unicast);
                }
            }
        }
        Ok(())
    }

    async fn update_node<F: FnOnce(&mut Node)>(
        &mut self,
        unicast: UnicastAddress,
        f: F,
    ) -> Result<(), DriverError> {
        let mut config = self.storage.get().await?;
        let node = config.node_mut(unicast).ok_or(DriverError::UnknownNode)?;
        f(node);
        self.storage.put(&config).await?;
        Ok(())
    }

    async fn send_vendor(
        &mut self,
        unicast: UnicastAddress,
        command: ZhiyunCommand,
    ) -> Result<(), DriverError> {
        self.require_attached()?;
        let node = self.node(unicast).await?;
        let (company, model_id) = match (node.configured, node.vendor_model()) {
            (true, Some(vendor_model)) => vendor_model,
            _ => return Err(DriverError::NodeNotConfigured),
        };
        let message = ZhiyunMessage {
            company,
            device_id: model_id,
            command,
        };
        self.send_access(unicast, &message).await
    }

    async fn send_access<M: Message>(
        &mut self,
        destination: UnicastAddress,
        message: &M,
    ) -> Result<(), DriverError> {
        let mut payload = AccessPayload::new();
        message.emit(&mut payload)?;
        self.send(&MeshRequest::Send {
            destination,
            app_key_index: self.config.app_key_index,
            payload,
        })
        .await
    }

    async fn send(&mut self, request: &MeshRequest) -> Result<(), DriverError> {
        match self.transport.request(request).await {
            Ok(()) => Ok(()),
            Err(TransportError::AlreadyExists)
                if matches!(request, MeshRequest::CreateAppKey { .. }) =>
            {
                debug!("application key already exists");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn node(&self, unicast: UnicastAddress) -> Result<Node, DriverError> {
        self.storage
            .get()
            .await?
            .node(unicast)
            .copied()
            .ok_or(DriverError::UnknownNode)
    }

    fn require_attached(&self) -> Result<(), DriverError> {
        if self.attached {
            Ok(())
        } else {
            Err(TransportError::NotAttached.into())
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::storage::MemoryBackingStore;
    use core::future::{ready, Ready};
    use embassy_futures::block_on;
    use rand_core::OsRng;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeTransport {
        requests: std::vec::Vec<MeshRequest>,
        events: VecDeque<MeshEvent>,
        app_key_exists: bool,
        unreachable: bool,
    }

    impl MeshTransport for FakeTransport {
        type RequestFuture<'m> = Ready<Result<(), TransportError>>
        where
            Self: 'm;
        type EventFuture<'m> = Ready<Result<MeshEvent, TransportError>>
        where
            Self: 'm;

        fn request<'m>(&'m mut self, request: &'m MeshRequest) -> Self::RequestFuture<'m> {
            self.requests.push(request.clone());
            let result = match request {
                _ if self.unreachable => Err(TransportError::Unavailable),
                MeshRequest::CreateAppKey { .. } if self.app_key_exists => {
                    Err(TransportError::AlreadyExists)
                }
                _ => Ok(()),
            };
            ready(result)
        }

        fn next_event(&mut self) -> Self::EventFuture<'_> {
            ready(self.events.pop_front().ok_or(TransportError::Unavailable))
        }
    }

    type TestDriver = Driver<FakeTransport, MemoryBackingStore, OsRng>;

    const TOKEN: u64 = 0x1122_3344_5566_7788;

    const VEGA_COMPOSITION: [u8; 20] = [
        0x02, 0x00, 0xF1, 0x05, 0x01, 0x00, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x01, 0x05, 0x09, 0x80, 0x03,
    ];
    const APPKEY_OK: [u8; 6] = [0x80, 0x03, 0x00, 0x00, 0x00, 0x00];
    const APPKEY_INVALID_ADDRESS: [u8; 6] = [0x80, 0x03, 0x01, 0x00, 0x00, 0x00];

    fn bind_ok(unicast: UnicastAddress) -> [u8; 11] {
        let [lo, hi] = unicast.to_le_bytes();
        [0x80, 0x3E, 0x00, lo, hi, 0x00, 0x00, 0x05, 0x09, 0x80, 0x03]
    }

    fn uuid(n: u8) -> Uuid {
        Uuid::new([n; 16])
    }

    fn addr(addr: u16) -> UnicastAddress {
        UnicastAddress::new(addr).unwrap()
    }

    fn payload(data: &[u8]) -> AccessPayload {
        AccessPayload::from_slice(data).unwrap()
    }

    fn dev_key(source: UnicastAddress, data: &[u8]) -> MeshEvent {
        MeshEvent::DevKeyMessage {
            source,
            data: payload(data),
        }
    }

    fn attached(transport: FakeTransport) -> TestDriver {
        let mut driver = Driver::new(
            transport,
            MemoryBackingStore::default(),
            OsRng,
            DriverConfig::default(),
        );
        block_on(driver.initialize()).unwrap();
        block_on(driver.process(MeshEvent::JoinComplete { token: TOKEN })).unwrap();
        block_on(driver.process(MeshEvent::Attached)).unwrap();
        driver.transport.requests.clear();
        driver
    }

    /// Runs the add-node handshake for one device and returns its address.
    fn provision(driver: &mut TestDriver, n: u8, count: u8) -> UnicastAddress {
        block_on(driver.start_scan(5)).unwrap();
        block_on(driver.process(MeshEvent::ScanResult {
            rssi: -50,
            data: Vec::from_slice(&[n; 18]).unwrap(),
        }))
        .unwrap();
        block_on(driver.provision(0)).unwrap();
        block_on(driver.process(MeshEvent::RequestProvData { count })).unwrap();
        let unicast = match driver.transport.requests.last() {
            Some(MeshRequest::ProvisionData { unicast, .. }) => *unicast,
            other => panic!("unexpected {:?}", other),
        };
        block_on(driver.process(MeshEvent::AddNodeComplete {
            uuid: uuid(n),
            unicast,
            count,
        }))
        .unwrap();
        unicast
    }

    fn dev_key_payloads(driver: &TestDriver) -> std::vec::Vec<std::vec::Vec<u8>> {
        driver
            .transport
            .requests
            .iter()
            .filter_map(|request| match request {
                MeshRequest::DevKeySend { payload, .. } => Some(payload.to_vec()),
                _ => None,
            })
            .collect()
    }

    fn stored_node(driver: &TestDriver, unicast: UnicastAddress) -> Node {
        *driver
            .storage
            .backing_store()
            .content()
            .node(unicast)
            .unwrap()
    }

    #[test]
    fn creates_network_when_none_stored() {
        let mut driver = Driver::new(
            FakeTransport::default(),
            MemoryBackingStore::default(),
            OsRng,
            DriverConfig::default(),
        );
        block_on(driver.initialize()).unwrap();
        assert!(matches!(
            driver.transport.requests[..],
            [MeshRequest::CreateNetwork { .. }]
        ));

        block_on(driver.process(MeshEvent::JoinComplete { token: TOKEN })).unwrap();
        assert_eq!(
            driver.transport.requests.last(),
            Some(&MeshRequest::Attach { token: TOKEN })
        );
        assert_eq!(
            driver.storage.backing_store().content().network().token,
            Some(TOKEN)
        );
        assert!(!driver.is_attached());
        block_on(driver.process(MeshEvent::Attached)).unwrap();
        assert!(driver.is_attached());
    }

    #[test]
    fn attaches_to_stored_network() {
        let mut stored = Configuration::default();
        stored.set_token(Some(TOKEN));
        let mut driver = Driver::new(
            FakeTransport::default(),
            MemoryBackingStore::new(stored),
            OsRng,
            DriverConfig::default(),
        );
        block_on(driver.initialize()).unwrap();
        assert_eq!(
            driver.transport.requests,
            [MeshRequest::Attach { token: TOKEN }]
        );

        block_on(driver.process(MeshEvent::AttachFailed)).unwrap();
        assert!(matches!(
            driver.transport.requests.last(),
            Some(MeshRequest::CreateNetwork { .. })
        ));
        assert_eq!(driver.storage.backing_store().content().network().token, None);
    }

    #[test]
    fn operations_need_attachment() {
        let mut driver = Driver::new(
            FakeTransport::default(),
            MemoryBackingStore::default(),
            OsRng,
            DriverConfig::default(),
        );
        let not_attached = Err(DriverError::Transport(TransportError::NotAttached));
        assert_eq!(block_on(driver.start_scan(10)), not_attached);
        assert_eq!(block_on(driver.provision(0)), not_attached);
        assert_eq!(block_on(driver.configure(addr(2))), not_attached);
        assert_eq!(block_on(driver.set_power(addr(2), true)), not_attached);
    }

    #[test]
    fn provisions_and_configures() {
        let mut driver = attached(FakeTransport {
            app_key_exists: true,
            ..Default::default()
        });
        let unicast = provision(&mut driver, 1, 1);
        assert_eq!(unicast, addr(0x0002));

        let node = stored_node(&driver, unicast);
        assert_eq!(node.uuid, uuid(1));
        assert!(!node.configured);
        assert_eq!(
            driver.configuration_stage(unicast),
            Some(ConfigurationStage::CompositionPending)
        );
        assert_eq!(dev_key_payloads(&driver), [vec![0x80, 0x08, 0x00]]);

        block_on(driver.process(dev_key(unicast, &VEGA_COMPOSITION))).unwrap();
        let node = stored_node(&driver, unicast);
        assert_eq!(
            node.vendor_model(),
            Some((zyvega_common::CompanyIdentifier(0x0905), 0x0380))
        );
        // an existing application key is not an error
        assert!(driver.transport.requests.contains(&MeshRequest::AddAppKey {
            destination: unicast,
            app_key_index: driver.config().app_key_index,
            net_key_index: driver.config().net_key_index,
        }));

        block_on(driver.process(dev_key(unicast, &APPKEY_OK))).unwrap();
        assert_eq!(
            dev_key_payloads(&driver).last().unwrap(),
            &[0x80, 0x3D, 0x02, 0x00, 0x00, 0x00, 0x05, 0x09, 0x80, 0x03]
        );

        block_on(driver.process(dev_key(unicast, &bind_ok(unicast)))).unwrap();
        assert!(stored_node(&driver, unicast).configured);
        assert_eq!(
            driver.configuration_stage(unicast),
            Some(ConfigurationStage::Configured)
        );

        block_on(driver.set_color_temperature(unicast, 5600)).unwrap();
        assert_eq!(
            driver.transport.requests.last(),
            Some(&MeshRequest::Send {
                destination: unicast,
                app_key_index: driver.config().app_key_index,
                payload: payload(&[0xC2, 0x05, 0x09, 0x03, 0x80, 0x15, 0xE0]),
            })
        );

        block_on(driver.set_rgb(unicast, 50, 0xFF, 0x00, 0x80)).unwrap();
        assert_eq!(
            driver.transport.requests.last(),
            Some(&MeshRequest::Send {
                destination: unicast,
                app_key_index: driver.config().app_key_index,
                payload: payload(&[0xC3, 0x05, 0x09, 0x03, 0x80, 0x13, 0x88, 0xFF, 0x00, 0x80]),
            })
        );
    }

    #[test]
    fn unlisted_status_code_halts_configuration() {
        let mut driver = attached(FakeTransport::default());
        let unicast = provision(&mut driver, 1, 1);
        block_on(driver.process(dev_key(unicast, &VEGA_COMPOSITION))).unwrap();

        assert_eq!(
            block_on(driver.process(dev_key(unicast, &[0x80, 0x03, 0x12, 0x00, 0x00, 0x00]))),
            Err(DriverError::Configuration(
                ConfigurationError::AppKeyDistributionFailed(0x12)
            ))
        );
        assert_eq!(
            driver.configuration_error(unicast),
            Some(ConfigurationError::AppKeyDistributionFailed(0x12))
        );
        assert!(!stored_node(&driver, unicast).configured);
        assert_eq!(dev_key_payloads(&driver), [vec![0x80, 0x08, 0x00]]);
    }

    #[test]
    fn app_key_failure_halts_configuration() {
        let mut driver = attached(FakeTransport::default());
        let unicast = provision(&mut driver, 1, 1);
        block_on(driver.process(dev_key(unicast, &VEGA_COMPOSITION))).unwrap();

        assert_eq!(
            block_on(driver.process(dev_key(unicast, &APPKEY_INVALID_ADDRESS))),
            Err(DriverError::Configuration(
                ConfigurationError::AppKeyDistributionFailed(1)
            ))
        );
        assert!(!stored_node(&driver, unicast).configured);
        assert_eq!(
            driver.configuration_error(unicast),
            Some(ConfigurationError::AppKeyDistributionFailed(1))
        );
        // only composition get was sent under the device key, never a bind
        assert_eq!(dev_key_payloads(&driver), [vec![0x80, 0x08, 0x00]]);

        // vendor commands need a configured node
        assert_eq!(
            block_on(driver.set_color_temperature(unicast, 5600)),
            Err(DriverError::NodeNotConfigured)
        );

        // explicit resume starts again at the application key
        driver.transport.requests.clear();
        block_on(driver.configure(unicast)).unwrap();
        assert!(matches!(
            driver.transport.requests[..],
            [
                MeshRequest::CreateAppKey { .. },
                MeshRequest::AddAppKey { .. }
            ]
        ));
        assert_eq!(
            driver.configuration_stage(unicast),
            Some(ConfigurationStage::AppKeyPending)
        );
        assert_eq!(driver.configuration_error(unicast), None);
    }

    #[test]
    fn unicast_allocation_is_monotonic() {
        let mut driver = attached(FakeTransport::default());
        let counts = [1u8, 3, 2];
        for (n, count) in counts.iter().enumerate() {
            provision(&mut driver, n as u8 + 1, *count);
        }

        let nodes = block_on(driver.nodes()).unwrap();
        assert_eq!(nodes.len(), 3);
        let total: u16 = counts.iter().map(|count| *count as u16).sum();
        let registry = block_on(driver.registry()).unwrap();
        assert!(registry.network().next_unicast >= 2 + total);
        for (i, a) in nodes.iter().enumerate() {
            for b in nodes.iter().skip(i + 1) {
                assert!(!a.overlaps(b));
            }
        }

        // removal does not free addresses for reuse
        let first = nodes[0].unicast;
        block_on(driver.remove_node(first)).unwrap();
        assert_eq!(
            dev_key_payloads(&driver).last().unwrap(),
            &[0x80, 0x49]
        );
        let unicast = provision(&mut driver, 9, 1);
        assert_eq!(unicast, addr(2 + total));
    }

    #[test]
    fn scan_uses_configured_duration() {
        let mut driver = attached(FakeTransport::default());
        block_on(driver.scan()).unwrap();
        assert_eq!(
            driver.transport.requests,
            [MeshRequest::UnprovisionedScan { seconds: 10 }]
        );
        assert_eq!(driver.provisioning_state(), &ProvisioningState::Scanning);
    }

    #[test]
    fn provisioning_failure_is_reported() {
        let mut driver = attached(FakeTransport::default());
        block_on(driver.start_scan(5)).unwrap();
        block_on(driver.process(MeshEvent::ScanResult {
            rssi: -50,
            data: Vec::from_slice(&[4; 16]).unwrap(),
        }))
        .unwrap();
        block_on(driver.provision(0)).unwrap();

        let mut reason = heapless::String::new();
        reason.push_str("timeout").unwrap();
        let result = block_on(driver.process(MeshEvent::AddNodeFailed {
            uuid: uuid(4),
            reason: reason.clone(),
        }));
        assert_eq!(
            result,
            Err(DriverError::Provisioning(ProvisioningError::Failed(reason)))
        );
        assert!(block_on(driver.nodes()).unwrap().is_empty());
        assert_eq!(block_on(driver.registry()).unwrap().network().next_unicast, 2);
    }

    #[test]
    fn generic_commands_use_fresh_transaction_ids() {
        let mut driver = attached(FakeTransport::default());
        let unicast = provision(&mut driver, 1, 1);

        block_on(driver.set_power(unicast, true)).unwrap();
        block_on(driver.set_power(unicast, false)).unwrap();
        block_on(driver.set_brightness(unicast, 100)).unwrap();
        block_on(driver.set_brightness(unicast, 0)).unwrap();

        let sent: std::vec::Vec<_> = driver
            .transport
            .requests
            .iter()
            .filter_map(|request| match request {
                MeshRequest::Send { payload, .. } => Some(payload.to_vec()),
                _ => None,
            })
            .collect();
        assert_eq!(
            sent,
            [
                vec![0x82, 0x03, 0x01, 0x00],
                vec![0x82, 0x03, 0x00, 0x01],
                vec![0x82, 0x06, 0xFF, 0x7F, 0x02],
                vec![0x82, 0x06, 0x00, 0x80, 0x03],
            ]
        );

        assert_eq!(
            block_on(driver.set_brightness(unicast, 101)),
            Err(DriverError::InvalidValue)
        );
        assert_eq!(
            block_on(driver.set_power(addr(0x0100), true)),
            Err(DriverError::UnknownNode)
        );
    }

    #[test]
    fn vendor_values_are_range_checked() {
        let mut driver = attached(FakeTransport::default());
        let unicast = provision(&mut driver, 1, 1);
        assert_eq!(
            block_on(driver.set_color_temperature(unicast, 2000)),
            Err(DriverError::InvalidValue)
        );
        assert_eq!(
            block_on(driver.set_rgb(unicast, 120, 0, 0, 0)),
            Err(DriverError::InvalidValue)
        );
    }

    #[test]
    fn reset_forgets_everything() {
        let mut driver = attached(FakeTransport::default());
        let unicast = provision(&mut driver, 1, 1);

        driver.transport.unreachable = true;
        block_on(driver.reset_network()).unwrap();
        assert_eq!(
            driver.transport.requests.last(),
            Some(&MeshRequest::Leave { token: TOKEN })
        );
        driver.transport.unreachable = false;

        assert!(!driver.is_attached());
        assert!(block_on(driver.nodes()).unwrap().is_empty());
        assert!(driver.scan_results().is_empty());
        assert_eq!(driver.configuration_stage(unicast), None);
        assert_eq!(driver.provisioning_state(), &ProvisioningState::Idle);

        // a late response for the old network is dropped
        let sent = driver.transport.requests.len();
        block_on(driver.process(dev_key(unicast, &VEGA_COMPOSITION))).unwrap();
        assert_eq!(driver.transport.requests.len(), sent);
    }

    #[test]
    fn run_drains_events() {
        let mut driver = Driver::new(
            FakeTransport::default(),
            MemoryBackingStore::default(),
            OsRng,
            DriverConfig::default(),
        );
        driver.transport.events.extend([
            MeshEvent::JoinComplete { token: TOKEN },
            MeshEvent::Attached,
            MeshEvent::Message {
                source: addr(2),
                data: payload(&[0x82, 0x04, 0x01]),
            },
        ]);
        assert_eq!(
            block_on(driver.run()),
            Err(DriverError::Transport(TransportError::Unavailable))
        );
        assert!(driver.is_attached());
    }

    #[test]
    fn add_node_rejected_by_daemon() {
        let mut driver = attached(FakeTransport::default());
        block_on(driver.start_scan(5)).unwrap();
        block_on(driver.process(MeshEvent::ScanResult {
            rssi: -50,
            data: Vec::from_slice(&[4; 16]).unwrap(),
        }))
        .unwrap();
        driver.transport.unreachable = true;
        assert_eq!(
            block_on(driver.provision(0)),
            Err(DriverError::Transport(TransportError::Unavailable))
        );
        assert_eq!(driver.provisioning_state(), &ProvisioningState::Idle);
        assert_eq!(driver.scan_results().len(), 1);
    }
}
