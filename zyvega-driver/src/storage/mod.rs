//! The node registry: network token, address allocation cursor and every
//! provisioned node, persisted as one document.

use crate::DriverError;
use core::cell::RefCell;
use core::future::Future;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use zyvega_common::address::UnicastAddress;
use zyvega_common::{CompanyIdentifier, Uuid};

#[cfg(feature = "std")]
mod file;
#[cfg(feature = "memory")]
mod memory;

#[cfg(feature = "std")]
pub use file::FileBackingStore;
#[cfg(feature = "memory")]
pub use memory::MemoryBackingStore;

pub const MAX_NODES: usize = 32;

/// Scratch space for one serialized [`Configuration`].
pub const MAX_SERIALIZED_LEN: usize = 4096;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    Load,
    Store,
    Serialization,
    Deserialization,
}

pub trait BackingStore {
    type LoadFuture<'m>: Future<Output = Result<Configuration, StorageError>> + 'm
    where
        Self: 'm;

    type StoreFuture<'m>: Future<Output = Result<(), StorageError>> + 'm
    where
        Self: 'm;

    type ClearFuture<'m>: Future<Output = Result<(), StorageError>> + 'm
    where
        Self: 'm;

    fn load(&mut self) -> Self::LoadFuture<'_>;
    fn store<'f>(&'f mut self, config: &'f Configuration) -> Self::StoreFuture<'f>;
    fn clear(&mut self) -> Self::ClearFuture<'_>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Node {
    pub uuid: Uuid,
    pub unicast: UnicastAddress,
    pub element_count: u8,
    pub company_id: Option<CompanyIdentifier>,
    pub vendor_model_id: Option<u16>,
    pub configured: bool,
}

impl Node {
    pub fn new(uuid: Uuid, unicast: UnicastAddress, element_count: u8) -> Self {
        Self {
            uuid,
            unicast,
            element_count,
            company_id: None,
            vendor_model_id: None,
            configured: false,
        }
    }

    /// The vendor model lighting commands go to, once composition data
    /// has been read.
    pub fn vendor_model(&self) -> Option<(CompanyIdentifier, u16)> {
        match (self.company_id, self.vendor_model_id) {
            (Some(company_id), Some(model_id)) => Some((company_id, model_id)),
            _ => None,
        }
    }

    /// First address past this node's elements.
    pub fn range_end(&self) -> u16 {
        self.unicast.range_end(self.element_count)
    }

    pub fn overlaps(&self, other: &Node) -> bool {
        self.unicast.value() < other.range_end() && other.unicast.value() < self.range_end()
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NetworkState {
    /// Handle of the network held by the mesh daemon, once created.
    pub token: Option<u64>,
    /// Raw so that a fully allocated space can be represented as `0x8000`.
    pub next_unicast: u16,
}

impl Default for NetworkState {
    fn default() -> Self {
        Self {
            token: None,
            next_unicast: 0x0002,
        }
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    network: NetworkState,
    nodes: Vec<Node, MAX_NODES>,
}

impl Configuration {
    pub fn network(&self) -> &NetworkState {
        &self.network
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, unicast: UnicastAddress) -> Option<&Node> {
        self.nodes.iter().find(|node| node.unicast == unicast)
    }

    pub fn node_by_uuid(&self, uuid: &Uuid) -> Option<&Node> {
        self.nodes.iter().find(|node| node.uuid == *uuid)
    }

    pub(crate) fn node_mut(&mut self, unicast: UnicastAddress) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.unicast == unicast)
    }

    pub(crate) fn set_token(&mut self, token: Option<u64>) {
        self.network.token = token;
    }

    /// Records a freshly provisioned node and moves the allocation cursor
    /// past its elements. A device provisioned again replaces its old
    /// record; its old addresses are not handed out again.
    pub(crate) fn add_node(&mut self, node: Node) -> Result<(), DriverError> {
        self.nodes.retain(|existing| existing.uuid != node.uuid);
        self.nodes
            .push(node)
            .map_err(|_| DriverError::InsufficientSpace)?;
        self.network.next_unicast = self.network.next_unicast.max(node.range_end());
        Ok(())
    }

    pub(crate) fn remove_node(&mut self, unicast: UnicastAddress) -> Option<Node> {
        let index = self.nodes.iter().position(|node| node.unicast == unicast)?;
        Some(self.nodes.swap_remove(index))
    }

    /// Keeps the allocation cursor at or past `first_unicast` and every
    /// stored node, whatever the stored document claims.
    pub(crate) fn normalize(&mut self, first_unicast: UnicastAddress) {
        let floor = self
            .nodes
            .iter()
            .map(Node::range_end)
            .fold(first_unicast.value(), u16::max);
        self.network.next_unicast = self.network.next_unicast.max(floor);
    }
}

pub struct Storage<B: BackingStore> {
    backing_store: RefCell<B>,
    config: RefCell<Option<Configuration>>,
    first_unicast: UnicastAddress,
}

impl<B: BackingStore> Storage<B> {
    pub fn new(backing_store: B, first_unicast: UnicastAddress) -> Self {
        Self {
            backing_store: RefCell::new(backing_store),
            config: RefCell::new(None),
            first_unicast,
        }
    }

    pub async fn get(&self) -> Result<Configuration, StorageError> {
        self.load_if_needed().await?;
        if let Some(config) = &*self.config.borrow() {
            Ok(config.clone())
        } else {
            Err(StorageError::Load)
        }
    }

    /// Writes through to the backing store before the cached copy changes.
    pub async fn put(&self, config: &Configuration) -> Result<(), StorageError> {
        if self.config.borrow().as_ref() == Some(config) {
            return Ok(());
        }
        self.backing_store.borrow_mut().store(config).await?;
        self.config.borrow_mut().replace(config.clone());
        Ok(())
    }

    /// Forgets the network and every node.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.backing_store.borrow_mut().clear().await?;
        let mut config = Configuration::default();
        config.normalize(self.first_unicast);
        self.config.borrow_mut().replace(config);
        Ok(())
    }

    async fn load_if_needed(&self) -> Result<(), StorageError> {
        if self.config.borrow().is_none() {
            let mut config = self.backing_store.borrow_mut().load().await?;
            config.normalize(self.first_unicast);
            self.config.borrow_mut().replace(config);
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn backing_store(&self) -> core::cell::Ref<'_, B> {
        self.backing_store.borrow()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use embassy_futures::block_on;

    fn uuid(n: u8) -> Uuid {
        Uuid::new([n; 16])
    }

    fn addr(addr: u16) -> UnicastAddress {
        UnicastAddress::new(addr).unwrap()
    }

    #[test]
    fn add_node_advances_cursor() {
        let mut config = Configuration::default();
        config.add_node(Node::new(uuid(1), addr(0x0002), 3)).unwrap();
        assert_eq!(config.network().next_unicast, 0x0005);

        // an older, lower range never moves the cursor back
        config.add_node(Node::new(uuid(2), addr(0x0003), 1)).unwrap();
        assert_eq!(config.network().next_unicast, 0x0005);
    }

    #[test]
    fn reprovisioned_device_replaces_record() {
        let mut config = Configuration::default();
        config.add_node(Node::new(uuid(1), addr(0x0002), 1)).unwrap();
        config.add_node(Node::new(uuid(1), addr(0x0003), 1)).unwrap();
        assert_eq!(config.nodes().len(), 1);
        assert_eq!(config.node_by_uuid(&uuid(1)).unwrap().unicast, addr(0x0003));
        assert_eq!(config.network().next_unicast, 0x0004);
    }

    #[test]
    fn remove_node_keeps_cursor() {
        let mut config = Configuration::default();
        config.add_node(Node::new(uuid(1), addr(0x0002), 2)).unwrap();
        assert!(config.remove_node(addr(0x0002)).is_some());
        assert!(config.remove_node(addr(0x0002)).is_none());
        assert!(config.nodes().is_empty());
        assert_eq!(config.network().next_unicast, 0x0004);
    }

    #[test]
    fn registry_full() {
        let mut config = Configuration::default();
        for n in 0..MAX_NODES {
            config
                .add_node(Node::new(uuid(n as u8), addr(2 + n as u16), 1))
                .unwrap();
        }
        assert_eq!(
            config.add_node(Node::new(uuid(0xFF), addr(0x0100), 1)),
            Err(DriverError::InsufficientSpace)
        );
    }

    #[test]
    fn overlap() {
        let a = Node::new(uuid(1), addr(0x0002), 2);
        let b = Node::new(uuid(2), addr(0x0003), 1);
        let c = Node::new(uuid(3), addr(0x0004), 1);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn load_recomputes_cursor() {
        let mut stored = Configuration::default();
        stored.nodes.push(Node::new(uuid(1), addr(0x0010), 4)).unwrap();
        stored.network.next_unicast = 0x0003;

        let storage = Storage::new(
            MemoryBackingStore::new(stored),
            UnicastAddress::new(0x0002).unwrap(),
        );
        let config = block_on(storage.get()).unwrap();
        assert_eq!(config.network().next_unicast, 0x0014);
    }

    #[test]
    fn put_writes_through_and_clear_forgets() {
        let storage = Storage::new(MemoryBackingStore::default(), addr(0x0002));
        let mut config = block_on(storage.get()).unwrap();
        config.set_token(Some(0xDEAD_BEEF));
        config.add_node(Node::new(uuid(7), addr(0x0002), 1)).unwrap();
        block_on(storage.put(&config)).unwrap();

        assert_eq!(storage.backing_store().content(), &config);

        block_on(storage.clear()).unwrap();
        let config = block_on(storage.get()).unwrap();
        assert_eq!(config.network().token, None);
        assert_eq!(config.network().next_unicast, 0x0002);
        assert!(config.nodes().is_empty());
        assert_eq!(storage.backing_store().content(), &Configuration::default());
    }

    #[test]
    fn postcard_round_trip() {
        let mut config = Configuration::default();
        config.set_token(Some(42));
        let mut node = Node::new(uuid(9), addr(0x0002), 1);
        node.company_id = Some(CompanyIdentifier(0x0905));
        node.vendor_model_id = Some(0x0380);
        node.configured = true;
        config.add_node(node).unwrap();

        let mut buf = [0; MAX_SERIALIZED_LEN];
        let bytes = postcard::to_slice(&config, &mut buf).unwrap();
        let decoded: Configuration = postcard::from_bytes(bytes).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn stored_addresses_are_validated() {
        let mut buf = [0; 8];
        let bytes = postcard::to_slice(&0x0002u16, &mut buf).unwrap();
        let decoded: UnicastAddress = postcard::from_bytes(bytes).unwrap();
        assert_eq!(decoded, addr(0x0002));

        for invalid in [0x0000u16, 0x8000, 0xC001] {
            let mut buf = [0; 8];
            let bytes = postcard::to_slice(&invalid, &mut buf).unwrap();
            assert!(postcard::from_bytes::<UnicastAddress>(bytes).is_err());
        }
    }
}
